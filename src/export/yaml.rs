//! YAML Export functionality

use std::io::Write;

use crate::audit::LogEntry;
use crate::error::{TrackError, TrackResult};
use crate::export::json::LogExport;

/// Write entries as a YAML export document
pub fn export_entries_yaml<W: Write>(entries: Vec<LogEntry>, writer: &mut W) -> TrackResult<()> {
    let export = LogExport::from_entries(entries);

    let header = format!(
        "# tracklog change log export\n# Generated: {}\n# App Version: {}\n# Entries: {}\n\n",
        export.exported_at, export.app_version, export.metadata.entry_count
    );
    writer
        .write_all(header.as_bytes())
        .map_err(|e| TrackError::Export(e.to_string()))?;

    serde_yaml::to_writer(writer, &export).map_err(|e| TrackError::Export(e.to_string()))?;

    Ok(())
}

/// Read a YAML export back, for verification
pub fn import_from_yaml(yaml_str: &str) -> TrackResult<LogExport> {
    let export: LogExport =
        serde_yaml::from_str(yaml_str).map_err(|e| TrackError::Export(e.to_string()))?;

    export.validate().map_err(TrackError::Export)?;

    Ok(export)
}
