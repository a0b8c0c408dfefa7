//! tracklog - field-level change tracking for record stores
//!
//! Given a record before and after a mutation, tracklog computes which
//! fields changed, stamps the change with the ambient actor, correlation id
//! and remote address, and appends an immutable log entry to a store.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `models`: entity types, field metadata, snapshots, actors, the field
//!   catalog capability
//! - `audit`: value normalization, masking, the diff engine and log entries
//! - `registry`: per-entity tracking configuration and the track-all policy
//! - `context`: ambient actor / correlation id / disabled scopes
//! - `dispatch`: lifecycle events, the `ChangeTracker` and its observers
//! - `storage`: the `LogStore` trait with in-memory and JSON-lines stores
//! - `export`, `display`: output of stored entries
//! - `config`: paths and settings
//! - `cli`: command handlers for the `tracklog` binary
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tracklog::prelude::*;
//!
//! let catalog = Arc::new(
//!     StaticCatalog::new().entity("hr.Employee", [
//!         FieldMeta::new("name", FieldKind::Text),
//!         FieldMeta::new("ssn", FieldKind::Text),
//!     ]),
//! );
//! let registry = Arc::new(Registry::new());
//! registry.register("hr.Employee", TrackedEntityConfig::builder().mask(["ssn"]).build())?;
//!
//! let tracker = ChangeTracker::builder(registry, catalog, Arc::new(MemoryStore::new())).build();
//! let _actor = context::set_actor(Actor::new("42"));
//! tracker.handle(LifecycleEvent::update("hr.Employee", "7", before, after));
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod registry;
pub mod storage;

pub use error::{ConfigError, ContextScopeError, TrackError, TrackResult};

/// Commonly used types
pub mod prelude {
    pub use crate::audit::{Action, ChangeSet, ChangeValue, DiffEngine, LogEntry, Masker};
    pub use crate::context::{self, AmbientContext, CidResolver, RequestBoundary, RequestInfo};
    pub use crate::dispatch::{
        ChangeTracker, DispatchOutcome, LifecycleEvent, PostLogEvent, PreLogDecision, PreLogEvent,
    };
    pub use crate::error::{TrackError, TrackResult};
    pub use crate::models::{
        Actor, EntityType, FieldCatalog, FieldKind, FieldMeta, RelatedRecord, Snapshot,
        StaticCatalog,
    };
    pub use crate::registry::{Registry, TrackedEntityConfig};
    pub use crate::storage::{JsonlStore, LogFilter, LogStore, MemoryStore};
}
