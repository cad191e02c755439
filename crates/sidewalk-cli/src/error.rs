//! Error handling for the Sidewalk CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Sidewalk error: {0}")]
    Sidewalk(#[from] sidewalk_core::SidError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scenario failed: {0}")]
    Scenario(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

impl CliError {
    /// Whether the error comes from loading or validating configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CliError::Config(_)
                | CliError::Io(_)
                | CliError::TomlParsing(_)
                | CliError::Sidewalk(sidewalk_core::SidError::Configuration { .. })
        )
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
