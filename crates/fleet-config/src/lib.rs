//! Layered configuration loading for the fleet monitoring orchestrator.
//!
//! Configuration is loaded in order (later wins):
//! 1. Compiled defaults
//! 2. `/etc/fleet-monitor/config.toml` (system)
//! 3. `~/.config/fleet-monitor/config.toml` (user)
//! 4. `./fleet-monitor.toml` (local override, or `--config` path)
//! 5. Environment variables — `PORT`, `GATEWAY_PORT`, `GATEWAY_HOST`,
//!    `STREAM_INTERVAL`, `PERSISTENCE_POSTGRES_CONNECTION_STRING`,
//!    `PERSISTENCE_POSTGRES_MAX_POOL_SIZE`,
//!    `PERSISTENCE_POSTGRES_NOTIFICATION_CHANNEL`, `CHECKSUM_BINARY_PATH`,
//!    `LOG_LEVEL`, `LOG_FORMAT`.
//!
//! ```rust,no_run
//! use fleet_config::FleetConfig;
//!
//! let config = FleetConfig::load().expect("failed to load config");
//! println!("client-facing port: {}", config.network.port);
//! ```

pub mod infra;
pub mod loader;

pub use infra::{LogFormat, NetworkConfig, PersistenceConfig, PostgresConfig, RuntimeConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete fleet-monitor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl FleetConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply env overrides.
    pub fn load_from(config_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and return information about where values came
    /// from, so a `--show-config` flag can print provenance.
    pub fn load_with_sources_from(
        config_path: Option<&std::path::Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = FleetConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.stream_interval_ms)
    }

    /// Serialize config to TOML, for `--show-config`.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();
        output.push_str("# fleet-monitor configuration\n\n");

        output.push_str("[network]\n");
        output.push_str(&format!("port = {}\n", self.network.port));
        output.push_str(&format!("gateway_port = {}\n", self.network.gateway_port));
        output.push_str(&format!("gateway_host = \"{}\"\n", self.network.gateway_host));

        output.push_str("\n[runtime]\n");
        output.push_str(&format!("stream_interval_ms = {}\n", self.runtime.stream_interval_ms));
        output.push_str(&format!(
            "checksum_binary_path = \"{}\"\n",
            self.runtime.checksum_binary_path.display()
        ));

        output.push_str("\n[persistence.postgres]\n");
        output.push_str(&format!(
            "connection_string = \"{}\"\n",
            self.persistence.postgres.connection_string
        ));
        output.push_str(&format!(
            "max_pool_size = {}\n",
            self.persistence.postgres.max_pool_size
        ));
        output.push_str(&format!(
            "notification_channel = \"{}\"\n",
            self.persistence.postgres.notification_channel
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));
        let format_str = match self.telemetry.log_format {
            LogFormat::Human => "human",
            LogFormat::Json => "json",
        };
        output.push_str(&format!("log_format = \"{}\"\n", format_str));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = FleetConfig::default();
        assert_eq!(config.network.port, 8090);
        assert_eq!(config.runtime.stream_interval_ms, 500);
        assert_eq!(config.persistence.postgres.max_pool_size, 10);
    }

    #[test]
    fn to_toml_contains_all_sections() {
        let toml = FleetConfig::default().to_toml();
        assert!(toml.contains("[network]"));
        assert!(toml.contains("[runtime]"));
        assert!(toml.contains("[persistence.postgres]"));
        assert!(toml.contains("[telemetry]"));
    }

    #[test]
    fn load_works_with_no_files_present() {
        let config = FleetConfig::load().unwrap();
        assert_eq!(config.network.port, 8090);
    }
}
