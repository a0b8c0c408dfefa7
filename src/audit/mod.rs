//! Change computation for tracklog
//!
//! Turns pairs of record snapshots into the change payload of a log entry.
//!
//! # Architecture
//!
//! - `Normalizer`: renders raw field values into canonical JSON so that
//!   equal values compare equal regardless of representation.
//! - `Masker`: redacts sensitive values after comparison.
//! - `DiffEngine`: walks the field catalog in order and builds a
//!   `ChangeSet`, optionally with a masked full-state snapshot.
//! - `LogEntry`: the immutable record persisted by a store.
//!
//! # Example
//!
//! ```rust,ignore
//! use tracklog::audit::DiffEngine;
//! use tracklog::registry::TrackedEntityConfig;
//!
//! let config = TrackedEntityConfig::builder().mask(["ssn"]).build();
//! let changes = DiffEngine::new().diff(&config, Some(&before), Some(&after), &fields)?;
//! for change in changes.changes() {
//!     println!("{}: {} -> {}", change.label, change.old, change.new);
//! }
//! ```

mod changes;
mod diff;
mod entry;
mod mask;
mod normalize;

pub use changes::{
    ChangePayload, ChangeSet, ChangeValue, FieldChange, OrderedMap, RelationChange, RelationKind,
    RelationOperation, RelationPayload, StateSnapshot,
};
pub use diff::DiffEngine;
pub use entry::{format_value, Action, LogEntry, LogEntryBuilder, DEFAULT_OBJECT_REPR};
pub use mask::{mask_first_half, mask_full, resolve_masker, MaskStyle, Masker};
pub use normalize::{canonical, raw_json, Normalizer, NormalizerOptions};
