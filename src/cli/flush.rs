//! Flush command: delete log entries, optionally only older ones

use std::io::{BufRead, Write};

use clap::Args;

use super::parse_date_arg;
use crate::error::TrackResult;
use crate::storage::{LogFilter, LogStore};

/// Arguments of `tracklog flush`
#[derive(Args, Debug, Clone, Default)]
pub struct FlushArgs {
    /// Only delete entries before this date (YYYY-MM-DD or RFC 3339)
    #[arg(short, long)]
    pub before: Option<String>,

    /// Only delete entries of this entity type
    #[arg(short, long)]
    pub entity: Option<String>,

    /// Continue without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Handle the flush command, returning how many entries were deleted
///
/// Without `--yes` the user is asked on `input` and anything other than
/// `y`/`yes` aborts.
pub fn handle_flush_command<R: BufRead, W: Write>(
    store: &dyn LogStore,
    args: FlushArgs,
    input: &mut R,
    out: &mut W,
) -> TrackResult<usize> {
    let mut filter = LogFilter::new();
    if let Some(before) = &args.before {
        filter = filter.before(parse_date_arg(before)?);
    }
    if let Some(entity) = &args.entity {
        filter = filter.entity_type(entity.as_str());
    }

    let scope = match (&args.before, &args.entity) {
        (None, None) => "all log entries".to_string(),
        (Some(before), None) => format!("all log entries before {}", before),
        (None, Some(entity)) => format!("all log entries of {}", entity),
        (Some(before), Some(entity)) => {
            format!("all log entries of {} before {}", entity, before)
        }
    };
    writeln!(out, "This action will clear {}.", scope)?;

    if !args.yes {
        write!(out, "Are you sure you want to continue? [y/N] ")?;
        out.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            writeln!(out, "Aborting.")?;
            return Ok(0);
        }
    }

    let deleted = store.delete_matching(&filter)?;
    tracing::info!(deleted, "flushed change log");
    writeln!(out, "Deleted {} log entr{}.", deleted, if deleted == 1 { "y" } else { "ies" })?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Action, LogEntry};
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        for (ty, day) in [("blog.Article", 1), ("blog.Article", 20), ("blog.Tag", 1)] {
            let entry = LogEntry::builder(ty, "1", Action::Create)
                .timestamp(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap())
                .build();
            store.append(&entry).unwrap();
        }
        store
    }

    fn flush(store: &MemoryStore, args: FlushArgs, answer: &str) -> (usize, String) {
        let mut input = answer.as_bytes();
        let mut out = Vec::new();
        let deleted = handle_flush_command(store, args, &mut input, &mut out).unwrap();
        (deleted, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_declined_prompt_keeps_entries() {
        let store = store();
        let (deleted, output) = flush(&store, FlushArgs::default(), "n\n");
        assert_eq!(deleted, 0);
        assert!(output.contains("Are you sure you want to continue? [y/N]"));
        assert!(output.contains("Aborting."));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_empty_answer_aborts() {
        let store = store();
        let (deleted, _) = flush(&store, FlushArgs::default(), "");
        assert_eq!(deleted, 0);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_confirmed_flush_all() {
        let store = store();
        let (deleted, output) = flush(&store, FlushArgs::default(), "y\n");
        assert_eq!(deleted, 3);
        assert!(output.contains("Deleted 3 log entries."));
        assert!(store.is_empty());
    }

    #[test]
    fn test_flush_before_date_without_prompt() {
        let store = store();
        let args = FlushArgs {
            before: Some("2024-03-10".into()),
            yes: true,
            ..FlushArgs::default()
        };
        let (deleted, output) = flush(&store, args, "");
        assert_eq!(deleted, 2);
        assert!(output.contains("before 2024-03-10"));
        assert!(!output.contains("[y/N]"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_flush_by_entity() {
        let store = store();
        let args = FlushArgs {
            entity: Some("blog.Tag".into()),
            yes: true,
            ..FlushArgs::default()
        };
        let (deleted, _) = flush(&store, args, "");
        assert_eq!(deleted, 1);
        assert_eq!(store.len(), 2);
    }
}
