use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Error reading file {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("Error parsing config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Error interpreting the config: {0}")]
    Config(String),
    #[error("{0}")]
    FlashLfq(#[from] flashlfq::FlashLfqError),
}

impl From<flashlfq::DataReadingError> for CliError {
    fn from(e: flashlfq::DataReadingError) -> Self {
        CliError::FlashLfq(e.into())
    }
}

impl From<flashlfq::ConfigError> for CliError {
    fn from(e: flashlfq::ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}
