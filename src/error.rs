//! Error types for the ingest, aggregation and export surfaces.
//!
//! Non-fatal conditions are not errors: they travel as
//! [`Advisory`](crate::types::Advisory) values next to a result.
use thiserror::Error;

/// Result type for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to turn one uploaded file into a table.
///
/// Reported per file; other files in the same upload set are still processed.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("file is empty")]
    Empty,

    #[error("could not decode file as UTF-8 or Shift_JIS")]
    Decode,

    #[error("missing or empty header row")]
    MissingHeader,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A requested column does not exist in the table being aggregated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("column not found: {column}")]
pub struct InvalidColumnError {
    pub column: String,
}

impl InvalidColumnError {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("failed to read credential file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid credential file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no users are configured")]
    NoUsers,

    #[error("unknown user")]
    UnknownUser,

    #[error("wrong password")]
    WrongPassword,

    #[error("stored hash is not a valid bcrypt hash: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Crate-level error wrapping every surface.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    InvalidColumn(#[from] InvalidColumnError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}
