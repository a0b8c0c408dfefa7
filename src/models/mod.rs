//! Core data models for tracklog
//!
//! Entity types, field metadata, raw values and snapshots, actors, and the
//! field catalog capability supplied by the host application.

pub mod actor;
pub mod catalog;
pub mod entity;
pub mod ids;
pub mod value;

pub use actor::{Actor, RemoteAddr};
pub use catalog::{FieldCatalog, StaticCatalog};
pub use entity::{Choice, EntityType, FieldKind, FieldMeta};
pub use ids::{LogEntryId, SubscriptionId};
pub use value::{FieldValue, RelatedRecord, Snapshot};
