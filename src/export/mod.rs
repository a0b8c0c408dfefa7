//! Export module for tracklog
//!
//! Provides log export in multiple formats:
//! - CSV: one row per entry (spreadsheet-compatible)
//! - JSON: machine-readable export with metadata
//! - YAML: human-readable export with metadata

pub mod csv;
pub mod json;
pub mod yaml;

pub use self::csv::export_entries_csv;
pub use json::{
    export_entries_json, import_from_json, ExportMetadata, LogExport, EXPORT_SCHEMA_VERSION,
};
pub use yaml::{export_entries_yaml, import_from_yaml};

use std::io::Write;

use clap::ValueEnum;

use crate::audit::LogEntry;
use crate::error::TrackResult;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Yaml,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Yaml => "yaml",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Write entries in the given format
pub fn export_entries<W: Write>(
    entries: Vec<LogEntry>,
    format: ExportFormat,
    writer: &mut W,
) -> TrackResult<()> {
    match format {
        ExportFormat::Json => export_entries_json(entries, writer, true),
        ExportFormat::Yaml => export_entries_yaml(entries, writer),
        ExportFormat::Csv => export_entries_csv(&entries, writer),
    }
}
