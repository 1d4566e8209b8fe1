use serde::{Deserialize, Serialize};

/// Severity reported for every shipped entry; only the error channel ships.
pub const REMOTE_LOG_LEVEL: &str = "ERROR";

/// Static and per-entry attributes attached to a shipped entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extra {
    pub log_level: String,
    pub os_name: String,
    pub os_arch: String,
    pub os_version: String,
    pub language: String,
    pub country: String,
    pub time_zone: String,
    pub version: String,
}

/// One structured message for the aggregation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub extra: Extra,
    pub location_info: String,
    pub message: String,
    pub full_message: String,
}
