//! Masking of sensitive values
//!
//! Maskers operate on the string form of a value. Old and new values are
//! masked independently, and only after the comparison that decided the
//! field changed.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::registry::TrackedEntityConfig;

/// Replace the first half of the characters with `*`
///
/// `"123-45-6789"` becomes `"*****5-6789"`. Counts characters, not bytes.
pub fn mask_first_half(value: &str) -> String {
    let count = value.chars().count();
    let masked = count / 2;
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i < masked { '*' } else { c })
        .collect()
}

/// Replace every character with `*`
pub fn mask_full(value: &str) -> String {
    "*".repeat(value.chars().count())
}

/// A masking function shared between configurations
#[derive(Clone)]
pub struct Masker(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl Masker {
    pub fn new<F>(mask: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self(Arc::new(mask))
    }

    pub fn first_half() -> Self {
        Self::new(mask_first_half)
    }

    pub fn full() -> Self {
        Self::new(mask_full)
    }

    pub fn apply(&self, value: &str) -> String {
        (self.0)(value)
    }

    /// Mask a normalized value. Null stays null; anything that is not a
    /// string is masked through its JSON text.
    pub fn mask_value(&self, value: &Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(self.apply(s)),
            other => Value::String(self.apply(&other.to_string())),
        }
    }
}

impl Default for Masker {
    fn default() -> Self {
        Self::first_half()
    }
}

impl fmt::Debug for Masker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Masker(..)")
    }
}

/// Built-in maskers selectable from settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskStyle {
    #[default]
    FirstHalf,
    Full,
}

impl MaskStyle {
    pub fn masker(self) -> Masker {
        match self {
            MaskStyle::FirstHalf => Masker::first_half(),
            MaskStyle::Full => Masker::full(),
        }
    }
}

impl std::str::FromStr for MaskStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_half" => Ok(MaskStyle::FirstHalf),
            "full" => Ok(MaskStyle::Full),
            other => Err(ConfigError::UnknownMasker(other.to_string())),
        }
    }
}

/// Pick the masker for an entity: its own callable, then the global
/// default, then the built-in first-half masker
pub fn resolve_masker(config: &TrackedEntityConfig, global_default: Option<&Masker>) -> Masker {
    config
        .mask_callable()
        .or(global_default)
        .cloned()
        .unwrap_or_default()
}
