//! Config file discovery, loading, and environment variable overlay.

use std::env;
use std::path::{Path, PathBuf};

use crate::infra::{LogFormat, NetworkConfig, PersistenceConfig, PostgresConfig, RuntimeConfig, TelemetryConfig};
use crate::{ConfigError, FleetConfig};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order).
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values.
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/fleet-monitor/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("fleet-monitor/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("fleet-monitor.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<FleetConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<FleetConfig, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut config = FleetConfig::default();

    if let Some(network) = table.get("network").and_then(|v| v.as_table()) {
        if let Some(v) = network.get("port").and_then(|v| v.as_integer()) {
            config.network.port = v as u16;
        }
        if let Some(v) = network.get("gateway_port").and_then(|v| v.as_integer()) {
            config.network.gateway_port = v as u16;
        }
        if let Some(v) = network.get("gateway_host").and_then(|v| v.as_str()) {
            config.network.gateway_host = v.to_string();
        }
    }

    if let Some(runtime) = table.get("runtime").and_then(|v| v.as_table()) {
        if let Some(v) = runtime.get("stream_interval_ms").and_then(|v| v.as_integer()) {
            config.runtime.stream_interval_ms = v as u64;
        }
        if let Some(v) = runtime.get("checksum_binary_path").and_then(|v| v.as_str()) {
            config.runtime.checksum_binary_path = PathBuf::from(v);
        }
    }

    if let Some(persistence) = table.get("persistence").and_then(|v| v.as_table()) {
        if let Some(pg) = persistence.get("postgres").and_then(|v| v.as_table()) {
            if let Some(v) = pg.get("connection_string").and_then(|v| v.as_str()) {
                config.persistence.postgres.connection_string = v.to_string();
            }
            if let Some(v) = pg.get("max_pool_size").and_then(|v| v.as_integer()) {
                config.persistence.postgres.max_pool_size = v as u32;
            }
            if let Some(v) = pg.get("notification_channel").and_then(|v| v.as_str()) {
                config.persistence.postgres.notification_channel = v.to_string();
            }
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
        if let Some(v) = telemetry.get("log_format").and_then(|v| v.as_str()) {
            if let Some(format) = LogFormat::parse(v) {
                config.telemetry.log_format = format;
            }
        }
    }

    Ok(config)
}

/// Merge two configs, with `overlay` taking precedence field-by-field —
/// a value only overrides if it differs from the compiled default.
pub fn merge_configs(base: FleetConfig, overlay: FleetConfig) -> FleetConfig {
    FleetConfig {
        network: NetworkConfig {
            port: pick(overlay.network.port, base.network.port, NetworkConfig::default().port),
            gateway_port: pick(
                overlay.network.gateway_port,
                base.network.gateway_port,
                NetworkConfig::default().gateway_port,
            ),
            gateway_host: pick(
                overlay.network.gateway_host,
                base.network.gateway_host,
                NetworkConfig::default().gateway_host,
            ),
        },
        runtime: RuntimeConfig {
            stream_interval_ms: pick(
                overlay.runtime.stream_interval_ms,
                base.runtime.stream_interval_ms,
                RuntimeConfig::default().stream_interval_ms,
            ),
            checksum_binary_path: pick(
                overlay.runtime.checksum_binary_path,
                base.runtime.checksum_binary_path,
                RuntimeConfig::default().checksum_binary_path,
            ),
        },
        persistence: PersistenceConfig {
            postgres: PostgresConfig {
                connection_string: pick(
                    overlay.persistence.postgres.connection_string,
                    base.persistence.postgres.connection_string,
                    PostgresConfig::default().connection_string,
                ),
                max_pool_size: pick(
                    overlay.persistence.postgres.max_pool_size,
                    base.persistence.postgres.max_pool_size,
                    PostgresConfig::default().max_pool_size,
                ),
                notification_channel: pick(
                    overlay.persistence.postgres.notification_channel,
                    base.persistence.postgres.notification_channel,
                    PostgresConfig::default().notification_channel,
                ),
            },
        },
        telemetry: TelemetryConfig {
            log_level: pick(
                overlay.telemetry.log_level,
                base.telemetry.log_level,
                TelemetryConfig::default().log_level,
            ),
            log_format: pick(
                overlay.telemetry.log_format,
                base.telemetry.log_format,
                TelemetryConfig::default().log_format,
            ),
        },
    }
}

/// Overlay wins if it differs from the compiled default; otherwise base.
fn pick<T: PartialEq>(overlay: T, base: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Apply environment variable overrides to config. Variable names are
/// exactly the ones named in the external configuration contract — no
/// `FLEET_` prefix, matching the original `envconfig` tags.
pub fn apply_env_overrides(config: &mut FleetConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("PORT") {
        if let Ok(port) = v.parse() {
            config.network.port = port;
            sources.env_overrides.push("PORT".to_string());
        }
    }
    if let Ok(v) = env::var("GATEWAY_PORT") {
        if let Ok(port) = v.parse() {
            config.network.gateway_port = port;
            sources.env_overrides.push("GATEWAY_PORT".to_string());
        }
    }
    if let Ok(v) = env::var("GATEWAY_HOST") {
        config.network.gateway_host = v;
        sources.env_overrides.push("GATEWAY_HOST".to_string());
    }
    if let Ok(v) = env::var("STREAM_INTERVAL") {
        if let Ok(ms) = parse_duration_ms(&v) {
            config.runtime.stream_interval_ms = ms;
            sources.env_overrides.push("STREAM_INTERVAL".to_string());
        }
    }
    if let Ok(v) = env::var("CHECKSUM_BINARY_PATH") {
        config.runtime.checksum_binary_path = PathBuf::from(v);
        sources.env_overrides.push("CHECKSUM_BINARY_PATH".to_string());
    }
    if let Ok(v) = env::var("PERSISTENCE_POSTGRES_CONNECTION_STRING") {
        config.persistence.postgres.connection_string = v;
        sources
            .env_overrides
            .push("PERSISTENCE_POSTGRES_CONNECTION_STRING".to_string());
    }
    if let Ok(v) = env::var("PERSISTENCE_POSTGRES_MAX_POOL_SIZE") {
        if let Ok(size) = v.parse() {
            config.persistence.postgres.max_pool_size = size;
            sources
                .env_overrides
                .push("PERSISTENCE_POSTGRES_MAX_POOL_SIZE".to_string());
        }
    }
    if let Ok(v) = env::var("PERSISTENCE_POSTGRES_NOTIFICATION_CHANNEL") {
        config.persistence.postgres.notification_channel = v;
        sources
            .env_overrides
            .push("PERSISTENCE_POSTGRES_NOTIFICATION_CHANNEL".to_string());
    }
    if let Ok(v) = env::var("LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("LOG_LEVEL".to_string());
    }
    // Also honor RUST_LOG, the ecosystem-standard override for EnvFilter.
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
    if let Ok(v) = env::var("LOG_FORMAT") {
        if let Some(format) = LogFormat::parse(&v) {
            config.telemetry.log_format = format;
            sources.env_overrides.push("LOG_FORMAT".to_string());
        }
    }
}

/// Parse a duration given either as a plain millisecond integer (`"500"`)
/// or with a unit suffix (`"500ms"`, `"2s"`).
fn parse_duration_ms(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s').and_then(|n| n.parse::<u64>().ok()) {
        return Ok(secs * 1000);
    }
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.parse();
    }
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_duration_plain_ms() {
        assert_eq!(parse_duration_ms("500").unwrap(), 500);
    }

    #[test]
    fn expand_duration_ms_suffix() {
        assert_eq!(parse_duration_ms("750ms").unwrap(), 750);
    }

    #[test]
    fn expand_duration_seconds_suffix() {
        assert_eq!(parse_duration_ms("2s").unwrap(), 2000);
    }

    #[test]
    fn discover_config_files_does_not_panic() {
        let _files = discover_config_files();
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[network]
port = 9000
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.network.gateway_port, 8091);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[network]
port = 9000
gateway_port = 9001
gateway_host = "127.0.0.1"

[runtime]
stream_interval_ms = 1000

[persistence.postgres]
connection_string = "postgres://db/fleet"
max_pool_size = 25
notification_channel = "custom_channel"

[telemetry]
log_level = "debug"
log_format = "json"
"#;
        let config = parse_toml(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.network.gateway_host, "127.0.0.1");
        assert_eq!(config.runtime.stream_interval_ms, 1000);
        assert_eq!(config.persistence.postgres.max_pool_size, 25);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn merge_prefers_overlay_non_default_values() {
        let base = FleetConfig::default();
        let mut overlay = FleetConfig::default();
        overlay.network.port = 12345;
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.network.port, 12345);
        assert_eq!(merged.network.gateway_port, 8091);
    }
}
