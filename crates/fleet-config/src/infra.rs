//! Individually-defaulted configuration sections. Each section's fields use
//! `#[serde(default = "...")]` against a private `default_*` fn, following
//! the pattern used throughout this codebase's infrastructure config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Client-facing and device-facing network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Client-facing service port.
    /// Default: 8090
    #[serde(default = "NetworkConfig::default_port")]
    pub port: u16,

    /// Device-facing gateway port (HTTP/HTTP-stream devices dial this).
    /// Default: 8091
    #[serde(default = "NetworkConfig::default_gateway_port")]
    pub gateway_port: u16,

    /// Device-facing gateway bind host.
    /// Default: 0.0.0.0
    #[serde(default = "NetworkConfig::default_gateway_host")]
    pub gateway_host: String,
}

impl NetworkConfig {
    fn default_port() -> u16 {
        8090
    }

    fn default_gateway_port() -> u16 {
        8091
    }

    fn default_gateway_host() -> String {
        "0.0.0.0".to_string()
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: Self::default_port(),
            gateway_port: Self::default_gateway_port(),
            gateway_host: Self::default_gateway_host(),
        }
    }
}

/// Postgres persistence settings: connection, pool sizing, LISTEN channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Default: postgres://localhost:5432/fleet
    #[serde(default = "PostgresConfig::default_connection_string")]
    pub connection_string: String,

    /// Pool must accommodate N_workers + 1 notifier + C client handlers;
    /// this is a starting point, not a hard ceiling.
    /// Default: 10
    #[serde(default = "PostgresConfig::default_max_pool_size")]
    pub max_pool_size: u32,

    /// Default: device_changes
    #[serde(default = "PostgresConfig::default_notification_channel")]
    pub notification_channel: String,
}

impl PostgresConfig {
    fn default_connection_string() -> String {
        "postgres://localhost:5432/fleet".to_string()
    }

    fn default_max_pool_size() -> u32 {
        10
    }

    fn default_notification_channel() -> String {
        "device_changes".to_string()
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            connection_string: Self::default_connection_string(),
            max_pool_size: Self::default_max_pool_size(),
            notification_channel: Self::default_notification_channel(),
        }
    }
}

/// Persistence layer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub postgres: PostgresConfig,
}

/// Collection cadence and the checksum helper process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Fan-out tick interval in milliseconds.
    /// Default: 500
    #[serde(default = "RuntimeConfig::default_stream_interval_ms")]
    pub stream_interval_ms: u64,

    /// Path to the external checksum binary invoked by device agents; kept
    /// here only so the orchestrator can surface it in diagnostics output,
    /// never invoked by this process.
    /// Default: checksum
    #[serde(default = "RuntimeConfig::default_checksum_binary_path")]
    pub checksum_binary_path: PathBuf,
}

impl RuntimeConfig {
    fn default_stream_interval_ms() -> u64 {
        500
    }

    fn default_checksum_binary_path() -> PathBuf {
        PathBuf::from("checksum")
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stream_interval_ms: Self::default_stream_interval_ms(),
            checksum_binary_path: Self::default_checksum_binary_path(),
        }
    }
}

/// Structured logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" | "text" | "pretty" => Some(LogFormat::Human),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,

    /// Default: human
    #[serde(default = "TelemetryConfig::default_log_format")]
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_log_format() -> LogFormat {
        LogFormat::Human
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            log_format: Self::default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_defaults() {
        let net = NetworkConfig::default();
        assert_eq!(net.port, 8090);
        assert_eq!(net.gateway_port, 8091);
        assert_eq!(net.gateway_host, "0.0.0.0");
    }

    #[test]
    fn postgres_defaults() {
        let pg = PostgresConfig::default();
        assert_eq!(pg.max_pool_size, 10);
        assert_eq!(pg.notification_channel, "device_changes");
    }

    #[test]
    fn runtime_defaults() {
        let runtime = RuntimeConfig::default();
        assert_eq!(runtime.stream_interval_ms, 500);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("human"), Some(LogFormat::Human));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
