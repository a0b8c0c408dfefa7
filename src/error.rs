//! Error types for tracklog
//!
//! Errors are split by who sees them. `ConfigError` reaches the caller that
//! registers entity types, `ContextScopeError` signals a broken scope
//! discipline, and diff/persistence failures are only ever handed to
//! post-log observers by the dispatcher.

use thiserror::Error;

/// Invalid registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The entity type already has an explicit configuration
    #[error("entity type already registered: {0}")]
    AlreadyRegistered(String),

    /// The entity type has no configuration to remove
    #[error("entity type not registered: {0}")]
    NotRegistered(String),

    /// Field rules that cannot be satisfied together
    #[error("conflicting field rules for {entity_type}: {reason}")]
    ConflictingFieldRules { entity_type: String, reason: String },

    /// A masker name in settings that has no built-in implementation
    #[error("unknown masker: {0}")]
    UnknownMasker(String),
}

/// Scope guards closed in the wrong order or on the wrong execution unit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextScopeError {
    #[error("scope {closing} closed while scope {innermost} is still open")]
    OutOfOrder { closing: u64, innermost: u64 },

    #[error("scope {0} is not open on this execution unit")]
    NotOpen(u64),
}

/// The main error type for tracklog operations
#[derive(Error, Debug)]
pub enum TrackError {
    /// Registry configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A value or field definition could not be diffed
    #[error("Diff computation error: {0}")]
    DiffComputation(String),

    /// The store refused or failed an append
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Ambient context scope misuse
    #[error("Context scope error: {0}")]
    ContextScope(#[from] ContextScopeError),

    /// Settings file problems
    #[error("Settings error: {0}")]
    Settings(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Store read/write problems outside the dispatch path
    #[error("Storage error: {0}")]
    Storage(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),

    /// Invalid user input (CLI arguments, dates, filters)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Log entry lookup misses
    #[error("Log entry not found: {0}")]
    NotFound(String),
}

impl TrackError {
    /// Check if this is a registry configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this error came from the diff stage
    pub fn is_diff(&self) -> bool {
        matches!(self, Self::DiffComputation(_))
    }

    /// Check if this error came from the store
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

impl From<std::io::Error> for TrackError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TrackError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for tracklog operations
pub type TrackResult<T> = Result<T, TrackError>;
