use crate::domain::{ConfigError, PipelineError};
use crate::remote::LogglyClientFactory;
use crate::remote::client::{DEFAULT_ENDPOINT, DEFAULT_TAG};
use crate::writer::RotationPolicy;
use crate::writer::rotator::{DEFAULT_MAX_ROTATION, DEFAULT_ROTATION_SIZE};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_APP_NAME: &str = "Lantern";
pub const DEFAULT_LOG_FILE: &str = "lantern.log";

/// Token for the aggregation service, injected at build time.
/// Without it remote shipping is never attempted.
const COMPILED_TOKEN: Option<&str> = option_env!("LOGGLY_TOKEN");

/// Where the process runs; decides the shape of the remote output set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformProfile {
    /// Errors go to the local sinks and the remote service.
    #[default]
    Desktop,
    /// Errors go to the remote service only; local files are not relied upon.
    Mobile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub app_name: String,
    /// Overrides the platform log directory.
    pub log_dir: Option<PathBuf>,
    pub file_name: String,
    pub rotation_size: u64,
    pub max_rotation: usize,
    pub platform: PlatformProfile,
    #[serde(skip_serializing)]
    pub remote_token: Option<String>,
    pub remote_endpoint: String,
    pub remote_tag: String,
    pub send_timeout_ms: u64,
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            log_dir: None,
            file_name: DEFAULT_LOG_FILE.to_string(),
            rotation_size: DEFAULT_ROTATION_SIZE,
            max_rotation: DEFAULT_MAX_ROTATION,
            platform: PlatformProfile::Desktop,
            remote_token: COMPILED_TOKEN.map(str::to_string),
            remote_endpoint: DEFAULT_ENDPOINT.to_string(),
            remote_tag: DEFAULT_TAG.to_string(),
            send_timeout_ms: 30_000,
            queue_capacity: 256,
        }
    }
}

impl PipelineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "App name must not be empty".to_string(),
            ));
        }

        if self.file_name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Log file name must not be empty".to_string(),
            ));
        }

        if self.rotation_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Rotation size must be greater than 0".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "Queue capacity must be greater than 0".to_string(),
            ));
        }

        Url::parse(&self.remote_endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid remote endpoint URL '{}': {}",
                self.remote_endpoint, e
            ))
        })?;

        Ok(())
    }

    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            rotation_size: self.rotation_size,
            max_rotation: self.max_rotation,
        }
    }

    /// The remote credential, if one is configured and non-empty.
    pub fn remote_token(&self) -> Option<&str> {
        self.remote_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn resolve_log_dir(&self) -> Result<PathBuf, PipelineError> {
        match &self.log_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_log_dir(&self.app_name).ok_or_else(|| PipelineError::NoLogDir {
                app_name: self.app_name.clone(),
            }),
        }
    }

    pub fn client_factory(&self) -> LogglyClientFactory {
        LogglyClientFactory {
            endpoint: self.remote_endpoint.clone(),
            tag: self.remote_tag.clone(),
            timeout: Duration::from_millis(self.send_timeout_ms),
            queue_capacity: self.queue_capacity,
        }
    }
}

/// Per-application log directory of the current platform.
pub fn default_log_dir(app_name: &str) -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library").join("Logs").join(app_name))
    } else {
        dirs::data_local_dir().map(|dir| dir.join(app_name).join("logs"))
    }
}
