//! CLI command implementations

pub mod categorize;
pub mod logs;
pub mod new;
pub mod rules;
pub mod transactions;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use haushalt_core::config::Config;
use haushalt_core::{EntryPoint, HaushaltContext, LogEvent, LoggingService};

/// Get the logging service for CLI operations
///
/// Returns None when logging is disabled or fails to initialize; logging
/// never blocks a command.
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    let enabled = Config::load(&data_dir).map(|c| c.logging_enabled).unwrap_or(true);
    if !enabled {
        return None;
    }
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Data directory from HAUSHALT_DIR, or ~/.haushalt
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("HAUSHALT_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".haushalt"))
        .ok_or_else(|| anyhow!("Could not find home directory; set HAUSHALT_DIR"))
}

/// Open the database and build the services
pub fn get_context() -> Result<HaushaltContext> {
    let data_dir = get_data_dir()?;
    HaushaltContext::new(&data_dir).context("Failed to initialize haushalt context")
}

/// Read a document from `file`, or from stdin when it is piped
pub fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None if atty::isnt(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
        None => Err(anyhow!("No input provided. Use --file or pipe JSON to stdin.")),
    }
}
