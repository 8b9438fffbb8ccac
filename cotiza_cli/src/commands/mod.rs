pub mod config;
pub mod providers;
pub mod quote;
pub mod search;

use crate::cli::Cli;
use cotiza_core::config::{ConfigError, Settings};
use cotiza_core::error::{ProviderError, QuoteError};
use cotiza_core::AggregationEngine;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Quote(#[from] QuoteError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Core library error: {0}")]
    Core(#[from] ProviderError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CommandError {
    /// Process exit code: 2 for malformed caller input, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Quote(_) | CommandError::InvalidInput(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;

pub fn load_settings(cli: &Cli) -> Result<Settings> {
    Ok(Settings::load(cli.config.as_deref())?)
}

pub fn create_engine(settings: &Settings) -> Result<AggregationEngine> {
    Ok(AggregationEngine::from_settings(settings)?)
}

/// Spinner on stderr while stores are queried.
pub fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}
