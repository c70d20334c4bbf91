//! Proctor
//!
//! Process-level glue for the proctoring core: layered settings, logging
//! setup, and a simulator that replays a scripted test attempt.

mod settings;
pub mod sim;

pub use settings::Settings;

use thiserror::Error;
use tracing_subscriber::FmtSubscriber;

/// Settings and startup errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
    #[error("Failed to install logger: {0}")]
    Logging(String),
}

/// Initialize logging
pub fn init_logging(settings: &Settings) -> Result<(), SettingsError> {
    let builder = FmtSubscriber::builder()
        .with_max_level(settings.level()?)
        .with_target(true);

    let installed = if settings.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.map_err(|e| SettingsError::Logging(e.to_string()))
}
