use thiserror::Error;

use crate::config::ConfigError;

/// Error type surfaced by an [`ObjectStore`](crate::upload::store::ObjectStore) backend.
///
/// Backends report transport failures verbatim; the pipeline never inspects them.
pub type StorageError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not delete file: {path}: {source}")]
    CouldNotDeleteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unusable object metadata returned for \"{key}\": {reason}")]
    RemoteMetadata { key: String, reason: String },

    #[error("Remote storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to walk directory: {0}")]
    Scan(#[from] walkdir::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid log notation: {0}")]
    InvalidLogNotation(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
