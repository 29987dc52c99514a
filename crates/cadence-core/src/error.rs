//! Error types for Cadence

use thiserror::Error;

/// The main error type for Cadence operations
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("Invalid target step: must be greater than zero")]
    InvalidTargetStep,

    #[error("Invalid max step: must be at least the target step")]
    InvalidMaxStep,

    #[error("Unsupported run behavior: {0}")]
    UnsupportedRunBehavior(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Component error: {0}")]
    ComponentError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),
}

/// Result type alias for Cadence operations
pub type Result<T> = std::result::Result<T, CadenceError>;

impl From<toml::de::Error> for CadenceError {
    fn from(err: toml::de::Error) -> Self {
        CadenceError::TomlParseError(err.to_string())
    }
}
