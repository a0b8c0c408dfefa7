use std::io::{self, Write};

use anyhow::Result;
use clap::{Parser, Subcommand};

use tracklog::cli::{
    handle_config_command, handle_flush_command, handle_log_command, FlushArgs, LogCommands,
};
use tracklog::config::{TrackerPaths, TrackerSettings};
use tracklog::logging::init_tracing;
use tracklog::storage::JsonlStore;

#[derive(Parser)]
#[command(
    name = "tracklog",
    version,
    about = "Inspect and maintain a tracklog change log",
    long_about = "tracklog records field-level changes to application records together \
                  with who made them and under which request. This tool browses, exports \
                  and prunes the JSON-lines change log."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse and export log entries
    #[command(subcommand)]
    Log(LogCommands),

    /// Delete log entries
    Flush(FlushArgs),

    /// Write default settings to the data directory
    Init,

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = TrackerPaths::new()?;
    let settings = TrackerSettings::load_or_create(&paths)?;
    init_tracing(&settings.log_level);

    let store = JsonlStore::new(paths.change_log());
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Some(Commands::Log(cmd)) => {
            handle_log_command(&store, &settings, cmd, &mut out)?;
        }
        Some(Commands::Flush(args)) => {
            let stdin = io::stdin();
            handle_flush_command(&store, args, &mut stdin.lock(), &mut out)?;
        }
        Some(Commands::Init) => {
            if paths.is_initialized() {
                writeln!(out, "Already initialized at: {}", paths.base_dir().display())?;
            } else {
                settings.save(&paths)?;
                writeln!(out, "Initialized tracklog at: {}", paths.base_dir().display())?;
                writeln!(out, "Edit {} to configure tracking.", paths.settings_file().display())?;
            }
        }
        Some(Commands::Config) => {
            handle_config_command(&paths, &settings, &mut out)?;
        }
        None => {
            writeln!(out, "tracklog - field-level change tracking")?;
            writeln!(out)?;
            writeln!(out, "Run 'tracklog --help' for usage information.")?;
        }
    }

    Ok(())
}
