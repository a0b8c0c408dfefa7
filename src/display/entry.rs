//! Log entry display formatting
//!
//! Formats log entries for terminal output in table and detail views.

use crate::audit::{format_value, Action, ChangeValue, LogEntry};
use crate::registry::TrackedEntityConfig;

/// Field list length after which the short message is cut
const SHORT_MESSAGE_MAX: usize = 75;

/// One change, ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayedChange {
    Field {
        label: String,
        old: String,
        new: String,
    },
    Relation {
        label: String,
        operation: String,
        objects: Vec<String>,
    },
}

impl DisplayedChange {
    pub fn label(&self) -> &str {
        match self {
            DisplayedChange::Field { label, .. } | DisplayedChange::Relation { label, .. } => label,
        }
    }
}

/// Cut a rendered value at `truncate_at` characters, marking the cut
pub fn truncate_value(value: &str, truncate_at: usize) -> String {
    if value.chars().count() <= truncate_at {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(truncate_at).collect();
    if truncate_at > 0 {
        cut.push_str("...");
    }
    cut
}

/// Changes of an entry with labels from the registry mapping, in payload
/// order
pub fn changes_display(
    entry: &LogEntry,
    config: Option<&TrackedEntityConfig>,
    truncate_at: usize,
) -> Vec<DisplayedChange> {
    entry
        .changes()
        .iter()
        .map(|(field, change)| {
            let label = config
                .and_then(|c| c.label_for(field))
                .unwrap_or(field)
                .to_string();
            match change {
                ChangeValue::Field(old, new) => DisplayedChange::Field {
                    label,
                    old: truncate_value(&format_value(old), truncate_at),
                    new: truncate_value(&format_value(new), truncate_at),
                },
                ChangeValue::Relation(relation) => DisplayedChange::Relation {
                    label,
                    operation: relation.operation.to_string(),
                    objects: relation
                        .objects
                        .iter()
                        .map(|o| truncate_value(o, truncate_at))
                        .collect(),
                },
            }
        })
        .collect()
}

/// "N changes: a, b" summary; empty for deletes and accesses
pub fn format_short_message(entry: &LogEntry) -> String {
    if matches!(entry.action(), Action::Delete | Action::Access) {
        return String::new();
    }

    let count = entry.changes().len();
    let mut fields = entry.changes().keys().collect::<Vec<_>>().join(", ");
    if fields.chars().count() > SHORT_MESSAGE_MAX {
        let head: String = fields.chars().take(SHORT_MESSAGE_MAX).collect();
        let cut = head.rfind(' ').unwrap_or(head.len());
        fields = format!("{} ..", &head[..cut]);
    }

    format!(
        "{} change{}: {}",
        count,
        if count == 1 { "" } else { "s" },
        fields
    )
}

/// Format a list of entries as a table
pub fn format_entry_list(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return "No log entries found.\n".to_string();
    }

    let entity_width = entries
        .iter()
        .map(|e| e.entity_type().as_str().len())
        .max()
        .unwrap_or(6)
        .max(6);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<12}  {:<19}  {:<15}  {:<entity_width$}  {:<10}  {:<12}  {}\n",
        "ID",
        "Timestamp",
        "Action",
        "Entity",
        "PK",
        "Actor",
        "Changes",
        entity_width = entity_width,
    ));
    output.push_str(&format!(
        "{:-<12}  {:-<19}  {:-<15}  {:-<entity_width$}  {:-<10}  {:-<12}  {:-<10}\n",
        "",
        "",
        "",
        "",
        "",
        "",
        "",
        entity_width = entity_width,
    ));

    for entry in entries {
        let actor = entry
            .actor()
            .map(|a| a.display.clone().unwrap_or_else(|| a.id.clone()))
            .unwrap_or_else(|| "system".to_string());
        output.push_str(&format!(
            "{:<12}  {:<19}  {:<15}  {:<entity_width$}  {:<10}  {:<12}  {}\n",
            entry.id().to_string(),
            entry.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.action().to_string(),
            entry.entity_type().as_str(),
            truncate_value(entry.object_pk(), 10),
            truncate_value(&actor, 12),
            format_short_message(entry),
            entity_width = entity_width,
        ));
    }

    output
}

/// Format entry details for display
pub fn format_entry_details(
    entry: &LogEntry,
    config: Option<&TrackedEntityConfig>,
    truncate_at: usize,
) -> String {
    let mut output = String::new();

    output.push_str(&format!("Entry:       {}\n", entry.id().as_uuid()));
    output.push_str(&format!("Summary:     {}\n", entry.summary()));
    output.push_str(&format!(
        "Timestamp:   {}\n",
        entry.timestamp().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!("Action:      {}\n", entry.action()));
    output.push_str(&format!(
        "Object:      {} {}\n",
        entry.entity_type(),
        entry.object_pk()
    ));

    match entry.actor() {
        Some(actor) => output.push_str(&format!("Actor:       {}\n", actor)),
        None => output.push_str("Actor:       system\n"),
    }
    if let Some(addr) = entry.remote_addr() {
        output.push_str(&format!("Remote:      {}\n", addr));
    }
    if let Some(cid) = entry.cid() {
        output.push_str(&format!("Correlation: {}\n", cid));
    }

    let changes = changes_display(entry, config, truncate_at);
    if !changes.is_empty() {
        output.push_str("\nChanges:\n");
        for (i, change) in changes.iter().enumerate() {
            match change {
                DisplayedChange::Field { label, old, new } => {
                    output.push_str(&format!("  {}. {}: {} -> {}\n", i + 1, label, old, new))
                }
                DisplayedChange::Relation {
                    label,
                    operation,
                    objects,
                } => output.push_str(&format!(
                    "  {}. {} ({}): {}\n",
                    i + 1,
                    label,
                    operation,
                    objects.join(", ")
                )),
            }
        }
    }

    if let Some(state) = entry.serialized_data() {
        output.push_str("\nState:\n");
        for (field, value) in state.iter() {
            output.push_str(&format!(
                "  {}: {}\n",
                field,
                truncate_value(&format_value(value), truncate_at)
            ));
        }
    }

    if let Some(data) = entry.additional_data() {
        output.push_str(&format!("\nAdditional:  {}\n", data));
    }

    output
}
