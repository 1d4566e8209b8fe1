//! Domain layer for lantern-logging.
//!
//! Contains the types shared across all modules:
//! - `Severity`: which output channel an entry belongs to (error or debug)
//! - `PipelineError`, `ConfigError`, `RemoteSendError`: the error taxonomy

pub mod error;
pub mod severity;

pub use error::{ConfigError, PipelineError, RemoteSendError};
pub use severity::Severity;
