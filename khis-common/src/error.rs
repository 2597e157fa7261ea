//! Common error types for the KHIS pipeline

use thiserror::Error;

/// Common result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the extraction, transformation and load stages
#[derive(Error, Debug)]
pub enum Error {
    /// Database driver error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration problem, including program/table prefix mismatch.
    /// Raised before any side effect and never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or HTTP failure talking to the remote analytics API
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unexpected payload or table shape
    #[error("Schema error: {0}")]
    Schema(String),

    /// Write or delete against the relational store failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid parameter (e.g. split ratio out of range)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A run input has not been produced yet (metadata or raw data)
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short machine-readable code used in logs and HTTP error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "DATABASE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Config(_) => "CONFIGURATION_ERROR",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::Schema(_) => "SCHEMA_ERROR",
            Error::Persistence(_) => "PERSISTENCE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::MissingInput(_) => "MISSING_INPUT",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = Error::Config("Program FP does not align with table mnch_raw".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: Program FP does not align with table mnch_raw"
        );
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
