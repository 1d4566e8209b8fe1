use crate::remote::ClientError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that affect the ability to log locally.
///
/// These are the only errors surfaced to the caller of `init` and `close`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unable to create log directory at {}: {source}", path.display())]
    CreateLogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unable to open log file at {}: {source}", path.display())]
    OpenLogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to close log file: {0}")]
    CloseLogFile(#[source] io::Error),

    #[error("Could not determine a log directory for {app_name}")]
    NoLogDir { app_name: String },

    #[error("Logging pipeline is already initialized")]
    AlreadyInitialized,

    #[error("Logging pipeline was never initialized")]
    NotInitialized,
}

impl PipelineError {
    /// Whether the failure came from the filesystem.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            PipelineError::CreateLogDir { .. }
                | PipelineError::OpenLogFile { .. }
                | PipelineError::CloseLogFile(_)
                | PipelineError::NoLogDir { .. }
        )
    }
}

/// Reasons remote shipping stays disabled, or configuration could not be loaded.
///
/// Remote shipping problems are never fatal: they are logged as diagnostics and
/// the pipeline keeps logging locally.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No remote log token compiled in")]
    MissingCredential,

    #[error("No version configured")]
    MissingVersion,

    #[error("No build date configured")]
    MissingBuildDate,

    #[error("No known proxy")]
    MissingProxy,

    #[error("Could not create proxied client: {0}")]
    Client(#[from] ClientError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("File error: {0}")]
    FileError(#[from] io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// A single message failed to reach the aggregation service.
#[derive(Error, Debug)]
pub enum RemoteSendError {
    #[error("Delivery queue is full, message dropped")]
    QueueFull,

    #[error("Delivery task has stopped")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<RemoteSendError> for io::Error {
    fn from(err: RemoteSendError) -> Self {
        io::Error::other(err)
    }
}
