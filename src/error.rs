//! Centralized error types for mailprism.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error produced by a message source.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All errors produced by the mailprism library.
#[derive(Error, Debug)]
pub enum MailError {
    /// The raw payload could not be parsed into a MIME structure.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// The message source answered, but the record carried no raw payload.
    #[error("Message '{id}' has no raw payload")]
    MissingRawPayload { id: String },

    /// The raw payload is not valid base64url.
    #[error("Message '{id}' has an undecodable transport encoding: {reason}")]
    TransportEncoding { id: String, reason: String },

    /// The message source failed. The source error is kept as-is.
    #[error("Failed to fetch message '{id}': {source}")]
    Fetch {
        id: String,
        #[source]
        source: SourceError,
    },

    /// The `Date` header could not be parsed (strict date policy only).
    #[error("Unparseable Date header: '{0}'")]
    InvalidDate(String),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a source failure for the given message id.
    pub fn fetch(id: impl Into<String>, source: impl Into<SourceError>) -> Self {
        Self::Fetch {
            id: id.into(),
            source: source.into(),
        }
    }
}
