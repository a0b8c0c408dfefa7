//! JSON Export functionality
//!
//! Exports log entries to JSON with schema versioning.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::LogEntry;
use crate::error::{TrackError, TrackResult};

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Exported log entries plus export metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogExport {
    /// Schema version for compatibility checking
    pub schema_version: String,

    pub exported_at: DateTime<Utc>,

    /// Application version that created the export
    pub app_version: String,

    /// Entries, oldest first
    pub entries: Vec<LogEntry>,

    pub metadata: ExportMetadata,
}

/// Export metadata for reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub entry_count: usize,

    /// Distinct entity types, sorted
    pub entity_types: Vec<String>,

    pub earliest_entry: Option<DateTime<Utc>>,

    pub latest_entry: Option<DateTime<Utc>>,
}

impl LogExport {
    pub fn from_entries(entries: Vec<LogEntry>) -> Self {
        let entity_types: BTreeSet<_> = entries
            .iter()
            .map(|e| e.entity_type().to_string())
            .collect();

        let metadata = ExportMetadata {
            entry_count: entries.len(),
            entity_types: entity_types.into_iter().collect(),
            earliest_entry: entries.iter().map(|e| e.timestamp()).min(),
            latest_entry: entries.iter().map(|e| e.timestamp()).max(),
        };

        Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            entries,
            metadata,
        }
    }

    /// Validate the export structure
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != EXPORT_SCHEMA_VERSION {
            return Err(format!(
                "Schema version mismatch: expected {}, got {}",
                EXPORT_SCHEMA_VERSION, self.schema_version
            ));
        }

        if self.metadata.entry_count != self.entries.len() {
            return Err(format!(
                "Metadata lists {} entries but export contains {}",
                self.metadata.entry_count,
                self.entries.len()
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.id()) {
                return Err(format!("Duplicate log entry {}", entry.id()));
            }
        }

        Ok(())
    }
}

/// Write entries as a JSON export document
pub fn export_entries_json<W: Write>(
    entries: Vec<LogEntry>,
    writer: &mut W,
    pretty: bool,
) -> TrackResult<()> {
    let export = LogExport::from_entries(entries);

    if pretty {
        serde_json::to_writer_pretty(writer, &export)
    } else {
        serde_json::to_writer(writer, &export)
    }
    .map_err(|e| TrackError::Export(e.to_string()))?;

    Ok(())
}

/// Read a JSON export back, for verification
pub fn import_from_json(json_str: &str) -> TrackResult<LogExport> {
    let export: LogExport =
        serde_json::from_str(json_str).map_err(|e| TrackError::Export(e.to_string()))?;

    export.validate().map_err(TrackError::Export)?;

    Ok(export)
}
