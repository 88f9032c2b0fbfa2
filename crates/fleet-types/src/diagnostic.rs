//! Diagnostic records, the snapshot view, and the giveup sentinel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::DeviceStatus;

/// Checksum value written by a worker's `on_giveup` action for a synthetic
/// offline record. Never produced by a device agent.
pub const INVALID_CHECKSUM_SENTINEL: &str = "invalid-checksum";

/// One row per successful or synthetic collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub device_id: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub device_status: DeviceStatus,
    pub hardware_version: String,
    pub software_version: String,
    pub firmware_version: String,
    pub checksum: String,
    pub timestamp: DateTime<Utc>,
}

impl Diagnostic {
    /// Build the synthetic offline record a worker's `on_giveup` writes
    /// after exhausting retries. Carries the sentinel checksum, never a
    /// device-reported one.
    pub fn offline(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            device_status: DeviceStatus::Offline,
            hardware_version: String::new(),
            software_version: String::new(),
            firmware_version: String::new(),
            checksum: INVALID_CHECKSUM_SENTINEL.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// True when the checksum is present and not the giveup sentinel —
    /// the invariant a device-agent-sourced record must satisfy.
    pub fn has_valid_checksum(&self) -> bool {
        !self.checksum.is_empty() && self.checksum != INVALID_CHECKSUM_SENTINEL
    }
}

/// The most recent diagnostic for a device, joined with device metadata.
/// Read by the Fan-out and by the client-facing `GetDiagnostics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub device_id: String,
    pub alias: String,
    pub host: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub device_status: DeviceStatus,
    pub hardware_version: String,
    pub software_version: String,
    pub firmware_version: String,
    pub checksum: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_record_carries_sentinel_checksum() {
        let d = Diagnostic::offline("dev-1");
        assert_eq!(d.device_status, DeviceStatus::Offline);
        assert_eq!(d.checksum, INVALID_CHECKSUM_SENTINEL);
        assert!(!d.has_valid_checksum());
    }

    #[test]
    fn real_checksum_is_valid() {
        let mut d = Diagnostic::offline("dev-1");
        d.checksum = "abc123".into();
        assert!(d.has_valid_checksum());
    }
}
