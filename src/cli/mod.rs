//! CLI command handlers
//!
//! This module contains the implementation of CLI commands, bridging the
//! clap argument parsing with the log store. Handlers write to the given
//! output so they can be driven from tests.

pub mod flush;
pub mod log;

pub use flush::{handle_flush_command, FlushArgs};
pub use log::{handle_log_command, FilterArgs, LogCommands};

use std::io::Write;

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::{TrackerPaths, TrackerSettings};
use crate::error::{TrackError, TrackResult};

/// Parse a `YYYY-MM-DD` date (midnight UTC) or an RFC 3339 timestamp
pub fn parse_date_arg(raw: &str) -> TrackResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            TrackError::Validation(format!(
                "Invalid date '{}'. Use YYYY-MM-DD or an RFC 3339 timestamp",
                raw
            ))
        })
}

/// Show current configuration and paths
pub fn handle_config_command<W: Write>(
    paths: &TrackerPaths,
    settings: &TrackerSettings,
    out: &mut W,
) -> TrackResult<()> {
    writeln!(out, "tracklog Configuration")?;
    writeln!(out, "======================")?;
    writeln!(out, "Base directory: {}", paths.base_dir().display())?;
    writeln!(out, "Settings file:  {}", paths.settings_file().display())?;
    writeln!(out, "Change log:     {}", paths.change_log().display())?;
    writeln!(
        out,
        "Initialized:    {}",
        if paths.is_initialized() { "yes" } else { "no" }
    )?;
    writeln!(out)?;
    writeln!(out, "Settings:")?;
    let json = serde_json::to_string_pretty(settings)?;
    writeln!(out, "{}", json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date_arg() {
        assert_eq!(
            parse_date_arg("2024-03-10").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date_arg("2024-03-10T12:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 10, 30, 0).unwrap()
        );
        assert!(parse_date_arg("10/03/2024").is_err());
    }

    #[test]
    fn test_config_output() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let paths = TrackerPaths::with_base_dir(temp_dir.path().to_path_buf());
        let mut out = Vec::new();
        handle_config_command(&paths, &TrackerSettings::default(), &mut out).unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("changes.log"));
        assert!(output.contains("\"disable_on_raw_save\": false"));
        assert!(output.contains("Initialized:    no"));
    }
}
