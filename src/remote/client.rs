use super::message::RemoteMessage;
use crate::domain::{ConfigError, RemoteSendError};
use chrono::{SecondsFormat, Utc};
use reqwest::{Certificate, Client, ClientBuilder, Proxy};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;
use url::Url;

#[cfg(test)]
use mockall::automock;

pub const DEFAULT_ENDPOINT: &str = "https://logs-01.loggly.com";
pub const DEFAULT_TAG: &str = "lantern";

/// Host name reported to the aggregation service instead of the real one.
pub const HIDDEN_HOSTNAME: &str = "hidden";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid proxy address '{addr}': {source}")]
    InvalidProxy {
        addr: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid CA certificate: {0}")]
    InvalidCertificate(#[source] reqwest::Error),
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("No async runtime available for the delivery task")]
    NoRuntime,
}

/// Sends one structured message to the aggregation service.
#[cfg_attr(test, automock)]
pub trait RemoteClient: Send + Sync {
    fn send(&self, message: &RemoteMessage) -> Result<(), RemoteSendError>;
}

/// Inputs of one remote (re)configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSettings {
    pub token: String,
    pub proxy_addr: String,
    pub ca_pem: String,
    pub instance_id: String,
    pub version: String,
    pub build_date: String,
}

/// Builds remote clients for the pipeline.
pub trait RemoteClientFactory: Send + Sync {
    fn build(&self, settings: &RemoteSettings) -> Result<Arc<dyn RemoteClient>, ConfigError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub token: String,
    pub tag: String,
    pub proxy_addr: Option<String>,
    pub ca_pem: Option<String>,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub queue_capacity: usize,
    pub user_agent: String,
    /// Fields merged into every message unless the message sets them.
    pub defaults: Map<String, Value>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: String::new(),
            tag: DEFAULT_TAG.to_string(),
            proxy_addr: None,
            ca_pem: None,
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            queue_capacity: 256,
            user_agent: format!("lantern-logging/{}", env!("CARGO_PKG_VERSION")),
            defaults: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryStats {
    pub sent: u64,
    pub failed: u64,
    pub dropped: u64,
    pub average_latency: Duration,
}

#[derive(Debug, Default)]
struct ClientStats {
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl ClientStats {
    fn record_delivery(&self, success: bool, latency: Duration) {
        self.total_latency_ms
            .fetch_add(latency.as_millis() as u64, Ordering::Relaxed);
        if success {
            self.sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> DeliveryStats {
        let sent = self.sent.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total = sent + failed;
        let average_latency = if total > 0 {
            Duration::from_millis(self.total_latency_ms.load(Ordering::Relaxed) / total)
        } else {
            Duration::ZERO
        };

        DeliveryStats {
            sent,
            failed,
            dropped: self.dropped.load(Ordering::Relaxed),
            average_latency,
        }
    }
}

/// HTTP client for a Loggly-compatible input API.
///
/// `send` never waits on the network: the message is queued for a delivery
/// task that posts one request per message. The task stops once the client
/// is dropped and the queue has drained.
#[derive(Debug)]
pub struct LogglyClient {
    config: ClientConfig,
    input_url: Url,
    queue: mpsc::Sender<Value>,
    stats: Arc<ClientStats>,
}

impl LogglyClient {
    /// Must be called from within a tokio runtime.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        if config.token.is_empty() {
            return Err(ClientError::InvalidConfiguration(
                "token must not be empty".to_string(),
            ));
        }
        if config.queue_capacity == 0 {
            return Err(ClientError::InvalidConfiguration(
                "queue capacity must be greater than 0".to_string(),
            ));
        }

        let input_url = input_url(&config.endpoint, &config.token, &config.tag)?;

        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent);

        if let Some(addr) = config.proxy_addr.as_deref().filter(|a| !a.is_empty()) {
            let proxy = Proxy::all(proxy_url(addr)).map_err(|source| ClientError::InvalidProxy {
                addr: addr.to_string(),
                source,
            })?;
            builder = builder.proxy(proxy);
        }

        if let Some(pem) = config.ca_pem.as_deref().filter(|p| !p.trim().is_empty()) {
            let cert =
                Certificate::from_pem(pem.as_bytes()).map_err(ClientError::InvalidCertificate)?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build().map_err(ClientError::Build)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let (queue, pending) = mpsc::channel(config.queue_capacity);
        let stats = Arc::new(ClientStats::default());
        runtime.spawn(deliver(http, input_url.clone(), pending, Arc::clone(&stats)));

        Ok(Self {
            config,
            input_url,
            queue,
            stats,
        })
    }

    pub fn input_url(&self) -> &Url {
        &self.input_url
    }

    pub fn stats(&self) -> DeliveryStats {
        self.stats.snapshot()
    }

    fn payload(&self, message: &RemoteMessage) -> Result<Value, RemoteSendError> {
        let mut value = serde_json::to_value(message)?;
        if let Value::Object(fields) = &mut value {
            for (key, default) in &self.config.defaults {
                fields.entry(key.clone()).or_insert_with(|| default.clone());
            }
            fields.entry("timestamp").or_insert_with(|| {
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
            });
        }
        Ok(value)
    }
}

impl RemoteClient for LogglyClient {
    fn send(&self, message: &RemoteMessage) -> Result<(), RemoteSendError> {
        let payload = self.payload(message)?;
        match self.queue.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(RemoteSendError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(RemoteSendError::Closed),
        }
    }
}

async fn deliver(
    http: Client,
    url: Url,
    mut pending: mpsc::Receiver<Value>,
    stats: Arc<ClientStats>,
) {
    while let Some(payload) = pending.recv().await {
        let start = Instant::now();
        // Failures are reported at debug level: error level would be shipped
        // again through this very client.
        let success = match http.post(url.clone()).json(&payload).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(
                    status = response.status().as_u16(),
                    "Remote log service rejected message"
                );
                false
            }
            Err(e) => {
                debug!("Failed to deliver log message: {e}");
                false
            }
        };
        stats.record_delivery(success, start.elapsed());
    }
}

fn input_url(endpoint: &str, token: &str, tag: &str) -> Result<Url, ClientError> {
    let mut url: Url = endpoint.parse().map_err(|e| {
        ClientError::InvalidConfiguration(format!("Invalid endpoint URL '{endpoint}': {e}"))
    })?;

    {
        let mut segments = url.path_segments_mut().map_err(|()| {
            ClientError::InvalidConfiguration(format!("Endpoint URL '{endpoint}' cannot be a base"))
        })?;
        segments.pop_if_empty().extend(["inputs", token]);
        if !tag.is_empty() {
            segments.extend(["tag", tag]);
        }
    }

    Ok(url)
}

fn proxy_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

/// Builds [`LogglyClient`]s that reach the service through the given proxy.
#[derive(Debug, Clone)]
pub struct LogglyClientFactory {
    pub endpoint: String,
    pub tag: String,
    pub timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for LogglyClientFactory {
    fn default() -> Self {
        let defaults = ClientConfig::default();
        Self {
            endpoint: defaults.endpoint,
            tag: defaults.tag,
            timeout: defaults.timeout,
            queue_capacity: defaults.queue_capacity,
        }
    }
}

impl LogglyClientFactory {
    pub fn client_config(&self, settings: &RemoteSettings) -> ClientConfig {
        let mut defaults = Map::new();
        defaults.insert("hostname".to_string(), Value::from(HIDDEN_HOSTNAME));
        defaults.insert(
            "instanceid".to_string(),
            Value::from(settings.instance_id.clone()),
        );

        ClientConfig {
            endpoint: self.endpoint.clone(),
            token: settings.token.clone(),
            tag: self.tag.clone(),
            proxy_addr: Some(settings.proxy_addr.clone()),
            ca_pem: Some(settings.ca_pem.clone()),
            timeout: self.timeout,
            queue_capacity: self.queue_capacity,
            defaults,
            ..ClientConfig::default()
        }
    }
}

impl RemoteClientFactory for LogglyClientFactory {
    fn build(&self, settings: &RemoteSettings) -> Result<Arc<dyn RemoteClient>, ConfigError> {
        let client = LogglyClient::new(self.client_config(settings))?;
        Ok(Arc::new(client))
    }
}
