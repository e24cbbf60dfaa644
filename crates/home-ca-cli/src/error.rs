//! CLI error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors loading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for the configuration schema.
    #[error("invalid YAML in '{}': {source}", path.display())]
    Parse {
        /// Configuration file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// One or more fields are missing or invalid.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Key or certificate handling failed.
    #[error(transparent)]
    Pki(#[from] home_ca::Error),

    /// The output directory could not be created.
    #[error("failed to create output directory '{}': {source}", path.display())]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Output formatting error.
    #[error("output error: {0}")]
    Output(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
