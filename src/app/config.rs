use super::initialization::LogLevel;
use crate::domain::ConfigError;
use crate::pipeline::{PipelineConfig, PlatformProfile};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Directory for the log file (platform default if not provided)
    #[arg(long, env = "LANTERN_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Minimum level written to the log
    #[arg(long, env = "LOG_LEVEL", default_value = "debug")]
    pub log_level: LogLevel,

    /// Extra `target=level` filter directives, e.g. `lantern_logging=trace`
    #[arg(long = "log-directive", env = "LOG_DIRECTIVES", value_delimiter = ',')]
    pub log_directives: Vec<String>,

    /// Level at which stdin lines are logged
    #[arg(long, env = "LINE_LEVEL", default_value = "info")]
    pub line_level: LogLevel,

    /// Local proxy that relays error reports to the remote service
    #[arg(long, env = "LANTERN_PROXY_ADDR")]
    pub proxy_addr: Option<String>,

    /// PEM certificate trusted for the proxy connection
    #[arg(long, env = "LANTERN_CA_FILE")]
    pub ca_file: Option<PathBuf>,

    /// Installation identifier attached to remote reports (random if not provided)
    #[arg(long, env = "LANTERN_INSTANCE_ID")]
    pub instance_id: Option<String>,

    /// Application version attached to remote reports
    #[arg(long, env = "LANTERN_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub app_version: String,

    /// Build date attached to remote reports
    #[arg(long, env = "LANTERN_BUILD_DATE", default_value = "")]
    pub build_date: String,

    /// Output layout once remote reporting is enabled
    #[arg(long, env = "LANTERN_PLATFORM")]
    pub platform: Option<PlatformProfile>,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::try_parse_from(args)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(addr) = &self.proxy_addr
            && addr.trim().is_empty()
        {
            return Err(ConfigError::InvalidConfig(
                "Proxy address must not be blank".to_string(),
            ));
        }

        Ok(())
    }

    /// File settings overridden by the command line.
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut pipeline = match &self.config_file {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = &self.log_dir {
            pipeline.log_dir = Some(dir.clone());
        }
        if let Some(platform) = self.platform {
            pipeline.platform = platform;
        }

        pipeline.validate()?;
        Ok(pipeline)
    }

    pub fn ca_pem(&self) -> Result<String, ConfigError> {
        match &self.ca_file {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => Ok(String::new()),
        }
    }

    pub fn instance_id(&self) -> String {
        self.instance_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}
