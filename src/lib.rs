#![deny(rust_2024_compatibility)]
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
#![allow(
    clippy::missing_errors_doc,      // Internal API
    clippy::missing_panics_doc,      // Internal API
    clippy::module_name_repetitions, // e.g. PipelineConfig in pipeline module
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

pub mod app;
pub mod domain;
pub mod pipeline;
pub mod remote;
pub mod writer;

pub use app::{App, Config};
pub use domain::{ConfigError, PipelineError, RemoteSendError, Severity};
pub use pipeline::{Pipeline, PipelineConfig, PipelineState, PipelineWriter, PlatformProfile};
pub use remote::{RemoteShipper, extract, extract_with};
pub use writer::{FanoutWriter, LogWriter, RotatingFile, TimestampPrepender};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
