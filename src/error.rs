//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while snapshotting, rendering or saving a document
#[derive(Error, Debug)]
pub enum Error {
    /// The live document root is not mounted
    #[error("Live document is not mounted")]
    NotMounted,

    /// The external engine failed to render the snapshot
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The engine produced bytes that are not a readable paginated document
    #[error("Renderer produced an unreadable document: {0}")]
    InvalidOutput(String),

    /// The save action for an export failed
    #[error("Failed to save {file_name}: {reason}")]
    SaveError { file_name: String, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::InvalidOutput(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}
