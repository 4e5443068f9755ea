//! Logging backend.
//!
//! The library logs through the `log` facade only.  The binary installs a
//! `tracing-subscriber` formatter, which also captures `log` records, so
//! every unit's output lands on stderr with its thread name attached.
//! Stdout stays free for the listener unit's message pipe.

use tracing_subscriber::filter::LevelFilter;

use crate::app::ports::ConfigError;

/// Parse a level name as written in the config file.
pub fn parse_level(level: &str) -> Result<LevelFilter, ConfigError> {
    level.parse::<LevelFilter>().map_err(|_| {
        ConfigError::ValidationFailed("log_level must be trace|debug|info|warn|error|off")
    })
}

/// Install the process-wide logger.  Call once, before starting any unit.
pub fn init(level: &str) -> anyhow::Result<()> {
    let filter = parse_level(level)?;
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logger init failed: {e}"))
}
