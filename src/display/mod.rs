//! Display formatting for terminal output
//!
//! Provides utilities for formatting log entries for terminal display.

pub mod entry;

pub use entry::{
    changes_display, format_entry_details, format_entry_list, format_short_message,
    truncate_value, DisplayedChange,
};
