//! PKI error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for PKI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// PKI error variants.
///
/// Every variant is terminal for a run; nothing here is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// A stored key parsed but is not an RSA key.
    #[error("invalid key type: expected RSA, found {0}")]
    InvalidKeyType(String),

    /// A stored key or certificate is malformed.
    #[error("parse failure: {0}")]
    Parse(String),

    /// Issuance input was rejected before anything was written.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Required naming fields or hosts were not supplied.
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// A certificate failed a validity, linkage or signature check.
    #[error("certificate validation failed: {0}")]
    Validation(String),

    /// Key generation, encoding or signing failed.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Filesystem access failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// Path that was being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
