//! CSV Export functionality
//!
//! One row per log entry. The change payload is kept as a JSON document in
//! its own column so no field order or value type is lost.

use std::io::Write;

use crate::audit::LogEntry;
use crate::error::{TrackError, TrackResult};

const HEADER: [&str; 11] = [
    "ID",
    "Timestamp",
    "Action",
    "Entity Type",
    "Object PK",
    "Object Repr",
    "Actor",
    "Actor Display",
    "Remote Address",
    "Correlation ID",
    "Changes",
];

/// Export log entries to CSV
pub fn export_entries_csv<W: Write>(entries: &[LogEntry], writer: &mut W) -> TrackResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(HEADER)
        .map_err(|e| TrackError::Export(e.to_string()))?;

    for entry in entries {
        let changes = serde_json::to_string(entry.changes())
            .map_err(|e| TrackError::Export(e.to_string()))?;
        let actor = entry.actor();

        csv_writer
            .write_record([
                entry.id().as_uuid().to_string(),
                entry.timestamp().to_rfc3339(),
                entry.action().as_str().to_string(),
                entry.entity_type().to_string(),
                entry.object_pk().to_string(),
                entry.object_repr().to_string(),
                actor.map(|a| a.id.clone()).unwrap_or_default(),
                actor.and_then(|a| a.display.clone()).unwrap_or_default(),
                entry.remote_addr().map(|a| a.to_string()).unwrap_or_default(),
                entry.cid().unwrap_or_default().to_string(),
                changes,
            ])
            .map_err(|e| TrackError::Export(e.to_string()))?;
    }

    csv_writer
        .flush()
        .map_err(|e| TrackError::Export(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Action, ChangePayload, ChangeValue};
    use crate::models::Actor;
    use serde_json::json;

    #[test]
    fn test_export_entries_csv() {
        let mut changes = ChangePayload::new();
        changes.insert("title", ChangeValue::Field(json!("a, b"), json!("c")));
        let entry = LogEntry::builder("blog.Article", "1", Action::Update)
            .repr("Article \"one\"")
            .changes(changes)
            .actor(Some(Actor::new("42").with_display("ada")))
            .cid(Some("req-1".into()))
            .build();

        let mut buffer = Vec::new();
        export_entries_csv(&[entry.clone()], &mut buffer).unwrap();
        let csv_str = String::from_utf8(buffer).unwrap();

        assert!(csv_str.starts_with("ID,Timestamp,Action,Entity Type"));

        let mut reader = csv::Reader::from_reader(csv_str.as_bytes());
        let rows: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(&row[0], entry.id().as_uuid().to_string());
        assert_eq!(&row[2], "update");
        assert_eq!(&row[5], "Article \"one\"");
        assert_eq!(&row[6], "42");
        assert_eq!(&row[7], "ada");
        assert_eq!(&row[8], "");
        assert_eq!(&row[9], "req-1");
        assert_eq!(&row[10], r#"{"title":["a, b","c"]}"#);
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let mut buffer = Vec::new();
        export_entries_csv(&[], &mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap().lines().count(), 1);
    }
}
