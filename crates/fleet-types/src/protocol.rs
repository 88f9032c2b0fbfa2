//! `Protocol` and `DeviceStatus` sum types.
//!
//! Both carry a stable wire representation (SCREAMING_SNAKE) alongside an
//! internal lowercase-hyphen name, following the `JobStatus` wire/internal
//! split used elsewhere in this codebase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol a device exposes.
///
/// `Unspecified` is a wire-only sentinel: it is accepted when parsing but
/// never produced by [`Protocol::from_wire`] round-tripping through the
/// orchestrator, and [`Protocol::preference_rank`] has no opinion on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[serde(rename = "http-stream")]
    HttpStream,
    Grpc,
    #[serde(rename = "grpc-stream")]
    GrpcStream,
    #[serde(skip)]
    Unspecified,
}

/// Highest-preference protocol first. Order mirrors `WorkerProtocolHierarchy`.
pub const PROTOCOL_PREFERENCE: [Protocol; 4] = [
    Protocol::GrpcStream,
    Protocol::HttpStream,
    Protocol::Grpc,
    Protocol::Http,
];

impl Protocol {
    /// Internal lowercase-hyphen name, e.g. `"grpc-stream"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::HttpStream => "http-stream",
            Protocol::Grpc => "grpc",
            Protocol::GrpcStream => "grpc-stream",
            Protocol::Unspecified => "unspecified",
        }
    }

    /// Parse the internal lowercase-hyphen name. Rejects `"unspecified"`.
    pub fn from_str_internal(s: &str) -> Option<Self> {
        match s {
            "http" => Some(Protocol::Http),
            "http-stream" => Some(Protocol::HttpStream),
            "grpc" => Some(Protocol::Grpc),
            "grpc-stream" => Some(Protocol::GrpcStream),
            _ => None,
        }
    }

    /// Wire (SCREAMING_SNAKE) representation, for the `.proto` contract.
    pub fn to_wire(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::HttpStream => "HTTP_STREAM",
            Protocol::Grpc => "GRPC",
            Protocol::GrpcStream => "GRPC_STREAM",
            Protocol::Unspecified => "UNSPECIFIED",
        }
    }

    /// Parse the wire representation. `"UNSPECIFIED"` parses but never
    /// round-trips back out through [`Protocol::to_wire`] via the
    /// orchestrator's own output.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "HTTP" => Some(Protocol::Http),
            "HTTP_STREAM" => Some(Protocol::HttpStream),
            "GRPC" => Some(Protocol::Grpc),
            "GRPC_STREAM" => Some(Protocol::GrpcStream),
            "UNSPECIFIED" => Some(Protocol::Unspecified),
            _ => None,
        }
    }

    /// True for `grpc` and `grpc-stream` — binary RPC transport, native port.
    pub fn is_binary_rpc(&self) -> bool {
        matches!(self, Protocol::Grpc | Protocol::GrpcStream)
    }

    /// True for `http` and `http-stream` — JSON/HTTP transport, gateway port.
    pub fn is_http(&self) -> bool {
        matches!(self, Protocol::Http | Protocol::HttpStream)
    }

    /// True for `grpc-stream` and `http-stream` — bound to the streaming
    /// strategy rather than polling.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Protocol::GrpcStream | Protocol::HttpStream)
    }

    /// Position in [`PROTOCOL_PREFERENCE`], lower is more preferred.
    pub fn preference_rank(&self) -> Option<usize> {
        PROTOCOL_PREFERENCE.iter().position(|p| p == self)
    }

    /// Pick the most-preferred protocol from a device's supported set.
    pub fn select_preferred<'a>(
        supported: impl IntoIterator<Item = &'a Protocol>,
    ) -> Option<Protocol> {
        let supported: std::collections::HashSet<Protocol> = supported.into_iter().copied().collect();
        PROTOCOL_PREFERENCE
            .into_iter()
            .find(|candidate| supported.contains(candidate))
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed or synthesized device status.
///
/// `Offline` is orchestrator-synthesized: it is never reported by a device
/// agent, only written by a worker's `on_giveup` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Healthy,
    Degraded,
    Error,
    Maintenance,
    Booting,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Healthy => "healthy",
            DeviceStatus::Degraded => "degraded",
            DeviceStatus::Error => "error",
            DeviceStatus::Maintenance => "maintenance",
            DeviceStatus::Booting => "booting",
            DeviceStatus::Offline => "offline",
        }
    }

    pub fn from_str_internal(s: &str) -> Option<Self> {
        match s {
            "healthy" => Some(DeviceStatus::Healthy),
            "degraded" => Some(DeviceStatus::Degraded),
            "error" => Some(DeviceStatus::Error),
            "maintenance" => Some(DeviceStatus::Maintenance),
            "booting" => Some(DeviceStatus::Booting),
            "offline" => Some(DeviceStatus::Offline),
            _ => None,
        }
    }

    pub fn to_wire(&self) -> &'static str {
        match self {
            DeviceStatus::Healthy => "HEALTHY",
            DeviceStatus::Degraded => "DEGRADED",
            DeviceStatus::Error => "ERROR",
            DeviceStatus::Maintenance => "MAINTENANCE",
            DeviceStatus::Booting => "BOOTING",
            DeviceStatus::Offline => "OFFLINE",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "HEALTHY" => Some(DeviceStatus::Healthy),
            "DEGRADED" => Some(DeviceStatus::Degraded),
            "ERROR" => Some(DeviceStatus::Error),
            "MAINTENANCE" => Some(DeviceStatus::Maintenance),
            "BOOTING" => Some(DeviceStatus::Booting),
            "OFFLINE" => Some(DeviceStatus::Offline),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_wire_roundtrip() {
        for p in [Protocol::Http, Protocol::HttpStream, Protocol::Grpc, Protocol::GrpcStream] {
            let wire = p.to_wire();
            assert_eq!(Protocol::from_wire(wire), Some(p));
        }
    }

    #[test]
    fn protocol_internal_roundtrip() {
        for p in [Protocol::Http, Protocol::HttpStream, Protocol::Grpc, Protocol::GrpcStream] {
            let s = p.as_str();
            assert_eq!(Protocol::from_str_internal(s), Some(p));
        }
    }

    #[test]
    fn unspecified_does_not_roundtrip_as_internal() {
        assert_eq!(Protocol::from_str_internal("unspecified"), None);
    }

    #[test]
    fn preference_order() {
        assert_eq!(
            PROTOCOL_PREFERENCE,
            [Protocol::GrpcStream, Protocol::HttpStream, Protocol::Grpc, Protocol::Http]
        );
    }

    #[test]
    fn select_preferred_picks_highest_rank() {
        let supported = [Protocol::Http, Protocol::GrpcStream, Protocol::Grpc];
        assert_eq!(Protocol::select_preferred(&supported), Some(Protocol::GrpcStream));
    }

    #[test]
    fn select_preferred_empty_set() {
        let supported: [Protocol; 0] = [];
        assert_eq!(Protocol::select_preferred(&supported), None);
    }

    #[test]
    fn device_status_wire_roundtrip() {
        for s in [
            DeviceStatus::Healthy,
            DeviceStatus::Degraded,
            DeviceStatus::Error,
            DeviceStatus::Maintenance,
            DeviceStatus::Booting,
            DeviceStatus::Offline,
        ] {
            assert_eq!(DeviceStatus::from_wire(s.to_wire()), Some(s));
        }
    }
}
