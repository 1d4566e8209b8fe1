//! The `lantern-log` binary: pipes stdin lines through the logging pipeline.

pub mod config;
pub mod initialization;
pub mod logging_system;

pub use config::Config;
pub use initialization::{InitializationError, LogDirective, LogLevel};
pub use logging_system::LoggingSystem;

use crate::pipeline::Pipeline;
use clap::Parser;
use std::process;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, trace, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct App {
    config: Config,
    pipeline: Pipeline,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, BoxError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, BoxError> {
        config.validate()?;
        let pipeline = Pipeline::new(config.to_pipeline_config()?);
        Ok(Self { config, pipeline })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Installs the subscriber and opens the log file.
    pub fn start(&self) -> Result<(), BoxError> {
        self.logging_system()?
            .initialize_tracing(self.pipeline.writer(), self.config.log_level)?;

        self.pipeline.init()?;
        info!("Starting lantern-log v{}", get_version());

        if let Some(addr) = &self.config.proxy_addr {
            let ca_pem = self.config.ca_pem()?;
            self.pipeline.configure(
                addr,
                &ca_pem,
                &self.config.instance_id(),
                &self.config.app_version,
                &self.config.build_date,
            );
        }

        Ok(())
    }

    /// Default directives followed by the ones given on the command line.
    pub fn logging_system(&self) -> Result<LoggingSystem, InitializationError> {
        let logging_system = LoggingSystem::new();
        logging_system.add_default_directives();
        for directive in &self.config.log_directives {
            logging_system.add_directive(directive)?;
        }
        Ok(logging_system)
    }

    /// Logs stdin line by line until EOF or Ctrl+C, then closes the pipeline.
    pub async fn run(self) -> Result<(), BoxError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => log_line(self.config.line_level, &line),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, closing logs");
                    break;
                }
            }
        }

        debug!("Closing log file");
        self.pipeline.close()?;
        Ok(())
    }
}

fn log_line(level: LogLevel, line: &str) {
    match level {
        LogLevel::Error => error!("{line}"),
        LogLevel::Warn => warn!("{line}"),
        LogLevel::Info => info!("{line}"),
        LogLevel::Debug => debug!("{line}"),
        LogLevel::Trace => trace!("{line}"),
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub async fn main() -> Result<(), BoxError> {
    let app = match App::from_config(Config::parse()) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(2);
        }
    };

    if let Err(e) = app.start() {
        eprintln!("Failed to start logging: {e}");
        process::exit(1);
    }

    if let Err(e) = app.run().await {
        error!("Application error: {e}");
        process::exit(1);
    }

    Ok(())
}
