//! Error kinds surfaced by a migration run.

use std::path::PathBuf;
use thiserror::Error;

/// Missing or invalid configuration. Raised before any remote interaction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is not set or empty.
    #[error("missing required credential: {name} is not set")]
    MissingCredential { name: &'static str },

    /// Required run parameter is absent or out of range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Field mapping file could not be read.
    #[error("failed to read field mapping {path}: {source}")]
    MappingRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Field mapping file is not a JSON object of strings.
    #[error("invalid field mapping {path}: {source}")]
    MappingFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to produce records from the input location.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("input file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed row {line} in {path}: {message}")]
    Malformed {
        path: PathBuf,
        line: u64,
        message: String,
    },
}

/// Failure talking to the remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Credentials were rejected or the login endpoint was unreachable.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A whole request failed (network, timeout, HTTP status, undecodable body).
    #[error("{0}")]
    Transport(String),
}

/// Failure persisting the error report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write error report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to serialize record for row {row}: {source}")]
    Serialize {
        row: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Any fatal error of a migration run.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type Result<T> = std::result::Result<T, MigrationError>;
