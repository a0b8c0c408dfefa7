//! Entity types and field metadata
//!
//! Field metadata is what the field catalog hands the diff engine: the
//! declared kind drives normalization, the label feeds display, and the
//! declaration order fixes the order of every change set.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a tracked record's schema, e.g. `blog.Article`
///
/// The part before the first `.` is the application label, which global
/// deny lists can match as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Application label (`blog` in `blog.Article`), if the name is qualified
    pub fn app_label(&self) -> Option<&str> {
        self.0.split_once('.').map(|(app, _)| app)
    }

    /// Whether a deny-list entry names this type, either exactly or by its
    /// application label
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if pattern.contains('.') {
            self.0 == pattern
        } else {
            self.app_label() == Some(pattern) || self.0 == pattern
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Declared storage kind of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    Uuid,
    /// Stored code with a human-readable choice table on the field
    Choice,
    /// Foreign key / one-to-one; compared by related primary key
    Relation,
    /// Structured document compared with stable key order
    Json,
    /// Homogeneous array of another kind
    List(Box<FieldKind>),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Integer => write!(f, "integer"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Boolean => write!(f, "boolean"),
            FieldKind::Date => write!(f, "date"),
            FieldKind::DateTime => write!(f, "datetime"),
            FieldKind::Time => write!(f, "time"),
            FieldKind::Uuid => write!(f, "uuid"),
            FieldKind::Choice => write!(f, "choice"),
            FieldKind::Relation => write!(f, "relation"),
            FieldKind::Json => write!(f, "json"),
            FieldKind::List(inner) => write!(f, "list<{}>", inner),
        }
    }
}

/// One entry of a choice table: stored code and its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub value: Value,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Metadata for a single field, as listed by the field catalog
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub kind: FieldKind,
    /// Intrinsic human label; defaults to the name with underscores as spaces
    pub label: String,
    pub choices: Vec<Choice>,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let label = name.replace('_', " ");
        Self {
            name,
            kind,
            label,
            choices: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn choices(mut self, choices: impl IntoIterator<Item = Choice>) -> Self {
        self.choices = choices.into_iter().collect();
        self
    }

    /// Label for a stored choice code, if the table has one
    pub fn choice_label(&self, value: &Value) -> Option<&str> {
        self.choices
            .iter()
            .find(|choice| &choice.value == value)
            .map(|choice| choice.label.as_str())
    }
}
