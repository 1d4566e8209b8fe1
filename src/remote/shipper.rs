use super::client::{RemoteClient, RemoteSettings};
use super::locale::{self, GeoLookup};
use super::message::{Extra, REMOTE_LOG_LEVEL, RemoteMessage};
use super::reason;
use crate::domain::RemoteSendError;
use crate::writer::LogWriter;
use std::io;
use std::sync::Arc;

/// Attributes captured once when remote shipping is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteShipperConfig {
    pub language: String,
    pub time_zone: String,
    /// `"<version> (<build date>)"`
    pub version: String,
    pub instance_id: String,
    pub proxy_addr: String,
    pub ca_pem: String,
}

impl RemoteShipperConfig {
    pub fn capture(settings: &RemoteSettings) -> Self {
        Self {
            language: locale::detect_language(),
            time_zone: locale::time_zone(),
            version: format!("{} ({})", settings.version, settings.build_date),
            instance_id: settings.instance_id.clone(),
            proxy_addr: settings.proxy_addr.clone(),
            ca_pem: settings.ca_pem.clone(),
        }
    }
}

/// Ships each error entry as one structured message.
///
/// This is the one writer that reports delivery failures; it is always placed
/// behind a [`FanoutWriter`](crate::writer::FanoutWriter), which ignores them.
pub struct RemoteShipper {
    config: RemoteShipperConfig,
    client: Arc<dyn RemoteClient>,
    geo: Arc<dyn GeoLookup>,
}

impl RemoteShipper {
    pub fn new(
        config: RemoteShipperConfig,
        client: Arc<dyn RemoteClient>,
        geo: Arc<dyn GeoLookup>,
    ) -> Self {
        Self {
            config,
            client,
            geo,
        }
    }

    pub fn config(&self) -> &RemoteShipperConfig {
        &self.config
    }

    pub fn message_for(&self, entry: &[u8]) -> RemoteMessage {
        let reason = reason::extract(entry);
        RemoteMessage {
            extra: Extra {
                log_level: REMOTE_LOG_LEVEL.to_string(),
                os_name: std::env::consts::OS.to_string(),
                os_arch: std::env::consts::ARCH.to_string(),
                os_version: String::new(),
                language: self.config.language.clone(),
                country: self.geo.country(),
                time_zone: self.config.time_zone.clone(),
                version: self.config.version.clone(),
            },
            location_info: reason.location_info,
            message: reason.message,
            full_message: String::from_utf8_lossy(entry).into_owned(),
        }
    }

    /// Sends one entry; on failure nothing counts as written.
    pub fn ship(&self, entry: &[u8]) -> Result<usize, RemoteSendError> {
        self.client.send(&self.message_for(entry))?;
        Ok(entry.len())
    }
}

impl LogWriter for RemoteShipper {
    fn write(&self, entry: &[u8]) -> io::Result<usize> {
        Ok(self.ship(entry)?)
    }

    fn write_parts(&self, parts: &[&[u8]]) -> io::Result<usize> {
        self.write(&parts.concat())
    }
}

impl std::fmt::Debug for RemoteShipper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteShipper")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::client::MockRemoteClient;
    use crate::writer::FanoutWriter;
    use mockall::predicate::function;

    fn config() -> RemoteShipperConfig {
        RemoteShipperConfig {
            language: "en".to_string(),
            time_zone: "UTC".to_string(),
            version: "5.1.0 (2024-03-01)".to_string(),
            instance_id: "abc".to_string(),
            proxy_addr: "127.0.0.1:8787".to_string(),
            ca_pem: String::new(),
        }
    }

    #[test]
    fn test_capture_formats_version_with_build_date() {
        let settings = RemoteSettings {
            version: "5.1.0".to_string(),
            build_date: "2024-03-01".to_string(),
            instance_id: "abc".to_string(),
            proxy_addr: "127.0.0.1:8787".to_string(),
            ..Default::default()
        };

        let captured = RemoteShipperConfig::capture(&settings);

        assert_eq!(captured.version, "5.1.0 (2024-03-01)");
        assert_eq!(captured.instance_id, "abc");
        assert_eq!(captured.proxy_addr, "127.0.0.1:8787");
    }

    #[test]
    fn test_message_carries_metadata_and_reason() {
        let client = MockRemoteClient::new();
        let shipper = RemoteShipper::new(config(), Arc::new(client), Arc::new(|| "DE".to_string()));

        let message = shipper.message_for(b"ERROR proxy: dial tcp 10.0.0.1:443: i/o timeout\n");

        assert_eq!(message.extra.log_level, "ERROR");
        assert_eq!(message.extra.os_name, std::env::consts::OS);
        assert_eq!(message.extra.os_arch, std::env::consts::ARCH);
        assert_eq!(message.extra.os_version, "");
        assert_eq!(message.extra.language, "en");
        assert_eq!(message.extra.country, "DE");
        assert_eq!(message.extra.time_zone, "UTC");
        assert_eq!(message.extra.version, "5.1.0 (2024-03-01)");
        assert_eq!(message.location_info, "ERROR proxy");
        assert_eq!(message.message, "dial tcp 10.0.0.1:443: i/o timeout");
        assert_eq!(
            message.full_message,
            "ERROR proxy: dial tcp 10.0.0.1:443: i/o timeout\n"
        );
    }

    #[test]
    fn test_write_sends_one_message_per_entry() {
        let mut client = MockRemoteClient::new();
        client
            .expect_send()
            .with(function(|m: &RemoteMessage| {
                m.message == "first\nsecond multi: line" && m.location_info == "ERROR a"
            }))
            .times(1)
            .returning(|_| Ok(()));
        let shipper = RemoteShipper::new(config(), Arc::new(client), Arc::new(String::new));

        let written = shipper.write(b"ERROR a: first\nsecond multi: line\n").unwrap();

        assert_eq!(written, 34);
    }

    #[test]
    fn test_send_failure_reports_error_and_zero_bytes() {
        let mut client = MockRemoteClient::new();
        client
            .expect_send()
            .times(1)
            .returning(|_| Err(RemoteSendError::QueueFull));
        let shipper = RemoteShipper::new(config(), Arc::new(client), Arc::new(String::new));

        assert!(matches!(shipper.ship(b"ERROR x: y"), Err(RemoteSendError::QueueFull)));
    }

    #[test]
    fn test_failure_is_hidden_behind_fanout() {
        let mut client = MockRemoteClient::new();
        client
            .expect_send()
            .times(1)
            .returning(|_| Err(RemoteSendError::Closed));
        let shipper = Arc::new(RemoteShipper::new(
            config(),
            Arc::new(client),
            Arc::new(String::new),
        ));
        let fanout = FanoutWriter::new(vec![shipper]);

        assert_eq!(fanout.write(b"ERROR x: y").unwrap(), 10);
    }
}
