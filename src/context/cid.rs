//! Correlation id resolution
//!
//! A request's correlation id comes from an inbound header when present,
//! otherwise from a configured generator. When storing correlation ids is
//! switched off, entries never carry one.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

pub const DEFAULT_CID_HEADER: &str = "X-Correlation-ID";

type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// Decides the correlation id of requests and entries
#[derive(Clone)]
pub struct CidResolver {
    store: bool,
    header: Option<String>,
    generator: Option<Generator>,
}

impl Default for CidResolver {
    fn default() -> Self {
        Self {
            store: true,
            header: Some(DEFAULT_CID_HEADER.to_string()),
            generator: None,
        }
    }
}

impl fmt::Debug for CidResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CidResolver")
            .field("store", &self.store)
            .field("header", &self.header)
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

impl CidResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never read, generate or store correlation ids
    pub fn disabled() -> Self {
        Self {
            store: false,
            header: None,
            generator: None,
        }
    }

    pub fn store(mut self, store: bool) -> Self {
        self.store = store;
        self
    }

    pub fn header(mut self, header: Option<String>) -> Self {
        self.header = header;
        self
    }

    pub fn generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Generate random v4 UUIDs when no header supplies an id
    pub fn uuid_generator(self) -> Self {
        self.generator(|| Uuid::new_v4().to_string())
    }

    pub fn stores(&self) -> bool {
        self.store
    }

    pub fn header_name(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn generate(&self) -> Option<String> {
        self.generator.as_ref().map(|generate| generate())
    }

    /// Correlation id for an inbound request, given a case-insensitive
    /// header lookup
    pub fn for_request<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> Option<String> {
        if !self.store {
            return None;
        }
        self.header
            .as_deref()
            .and_then(|name| lookup(name))
            .map(str::to_string)
            .or_else(|| self.generate())
    }

    /// Correlation id stamped on an entry created in the current execution
    /// unit. A generated id is kept in the ambient context so later entries
    /// of the same unit share it.
    pub fn for_entry(&self) -> Option<String> {
        if !self.store {
            return None;
        }
        super::cid_or_insert_with(|| self.generate())
    }
}
