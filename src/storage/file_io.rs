//! File I/O utilities with atomic writes
//!
//! Settings files and rewritten logs are written to a temp file in the same
//! directory, synced, then renamed over the original, so a crash leaves
//! either the old or the new content on disk.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::TrackError;

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, TrackError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)
        .map_err(|e| TrackError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| TrackError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write pretty JSON to a file atomically
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), TrackError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    write_atomic(path.as_ref(), "json.tmp", |writer| {
        serde_json::to_writer_pretty(writer, data)
            .map_err(|e| TrackError::Storage(format!("Failed to serialize data: {}", e)))
    })
}

/// Replace a line-delimited JSON file with `items`, one per line
pub fn write_jsonl_atomic<T, P>(path: P, items: &[T]) -> Result<(), TrackError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    write_atomic(path.as_ref(), "jsonl.tmp", |writer| {
        for item in items {
            serde_json::to_writer(&mut *writer, item)
                .map_err(|e| TrackError::Storage(format!("Failed to serialize data: {}", e)))?;
            writer
                .write_all(b"\n")
                .map_err(|e| TrackError::Storage(format!("Failed to write data: {}", e)))?;
        }
        Ok(())
    })
}

fn write_atomic<F>(path: &Path, temp_extension: &str, fill: F) -> Result<(), TrackError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), TrackError>,
{
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            TrackError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Temp file must live in the same directory for the rename to be atomic
    let temp_path = path.with_extension(temp_extension);

    let file = File::create(&temp_path)
        .map_err(|e| TrackError::Storage(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    if let Err(err) = fill(&mut writer) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    writer
        .flush()
        .map_err(|e| TrackError::Storage(format!("Failed to flush data: {}", e)))?;

    // Sync to disk before rename
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| TrackError::Storage(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        TrackError::Storage(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}
