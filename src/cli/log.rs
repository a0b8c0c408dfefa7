//! CLI commands for browsing and exporting the change log

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Subcommand;

use super::parse_date_arg;
use crate::audit::{Action, LogEntry};
use crate::config::TrackerSettings;
use crate::display::{format_entry_details, format_entry_list};
use crate::error::{TrackError, TrackResult};
use crate::export::{export_entries, ExportFormat};
use crate::models::EntityType;
use crate::storage::{LogFilter, LogStore};

/// Filters shared by `list` and `export`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Entity type, e.g. blog.Article
    #[arg(short, long)]
    pub entity: Option<String>,

    /// Primary key of the record
    #[arg(long)]
    pub pk: Option<String>,

    /// Action (create, update, delete, access, relation_add, relation_remove)
    #[arg(short, long)]
    pub action: Option<Action>,

    /// Actor id
    #[arg(long)]
    pub actor: Option<String>,

    /// Correlation id
    #[arg(long)]
    pub cid: Option<String>,

    /// Entries at or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub since: Option<String>,

    /// Entries before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub until: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> TrackResult<LogFilter> {
        let mut filter = LogFilter::new();
        if let Some(entity) = &self.entity {
            filter = filter.entity_type(entity.as_str());
        }
        filter.object_pk = self.pk.clone();
        filter.action = self.action;
        filter.actor_id = self.actor.clone();
        filter.cid = self.cid.clone();
        if let Some(since) = &self.since {
            filter = filter.since(parse_date_arg(since)?);
        }
        if let Some(until) = &self.until {
            filter = filter.before(parse_date_arg(until)?);
        }
        Ok(filter)
    }
}

/// Log subcommands
#[derive(Subcommand, Debug)]
pub enum LogCommands {
    /// List log entries, oldest first
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Show only the most recent N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show one entry in detail
    Show {
        /// Entry id (full UUID, short form or prefix)
        id: String,
    },

    /// Export log entries
    Export {
        #[command(flatten)]
        filter: FilterArgs,

        /// Export format
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Handle a log command
pub fn handle_log_command<W: Write>(
    store: &dyn LogStore,
    settings: &TrackerSettings,
    cmd: LogCommands,
    out: &mut W,
) -> TrackResult<()> {
    match cmd {
        LogCommands::List { filter, limit } => {
            let mut entries = store.query(&filter.to_filter()?)?;
            if let Some(limit) = limit {
                let start = entries.len().saturating_sub(limit);
                entries.drain(..start);
            }
            write!(out, "{}", format_entry_list(&entries))?;
            if !entries.is_empty() {
                writeln!(out, "\nTotal: {} entr{}", entries.len(), plural_y(entries.len()))?;
            }
        }

        LogCommands::Show { id } => {
            let entry = find_entry(store, &id)?;
            let registration = settings
                .include_tracking_entities
                .iter()
                .find(|r| EntityType::new(r.entity_type.as_str()) == *entry.entity_type())
                .map(|r| r.to_config(&settings.global_mask_fields));
            write!(
                out,
                "{}",
                format_entry_details(
                    &entry,
                    registration.as_ref(),
                    settings.change_display_truncate_length
                )
            )?;
        }

        LogCommands::Export {
            filter,
            format,
            output,
        } => {
            let entries = store.query(&filter.to_filter()?)?;
            let count = entries.len();
            match output {
                Some(path) => {
                    let file = File::create(&path).map_err(|e| {
                        TrackError::Export(format!(
                            "Failed to create file {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                    let mut writer = BufWriter::new(file);
                    export_entries(entries, format, &mut writer)?;
                    writer
                        .flush()
                        .map_err(|e| TrackError::Export(e.to_string()))?;
                    writeln!(
                        out,
                        "Exported {} entr{} to: {}",
                        count,
                        plural_y(count),
                        path.display()
                    )?;
                }
                None => export_entries(entries, format, out)?,
            }
        }
    }

    Ok(())
}

/// Resolve an id or id prefix to exactly one entry
fn find_entry(store: &dyn LogStore, query: &str) -> TrackResult<LogEntry> {
    let mut matches = store
        .all()?
        .into_iter()
        .filter(|e| e.id().matches(query));

    let entry = matches
        .next()
        .ok_or_else(|| TrackError::NotFound(query.to_string()))?;
    if matches.next().is_some() {
        return Err(TrackError::Validation(format!(
            "Entry id '{}' is ambiguous; use more characters",
            query
        )));
    }
    Ok(entry)
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}
