//! `Device` record and its registration input.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FleetError;
use crate::protocol::Protocol;

/// A registered network device.
///
/// `device_id` is the stable external identifier (health-response derived,
/// per the registration path's conflict rule); `id` is the persistence
/// surrogate key. `supported_protocols` is stored as a `TEXT[]` column and
/// decoded into a set here — the orchestrator only ever needs membership
/// plus the static preference table, never protocol order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub device_id: String,
    pub alias: String,
    pub host: String,
    pub port: u16,
    pub port_gateway: u16,
    pub architecture: String,
    pub os: String,
    pub supported_protocols: HashSet<Protocol>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Validate the non-empty `supported_protocols` invariant.
    ///
    /// Every other field is either generated by persistence (`id`,
    /// `created_at`, `updated_at`) or validated earlier in the registration
    /// path ([`RegisterDeviceRequest::validate`]).
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.supported_protocols.is_empty() {
            return Err(FleetError::InvalidArgument(format!(
                "device {} has no supported protocols",
                self.device_id
            )));
        }
        Ok(())
    }

    /// The protocol this device's worker should bind, per the preference
    /// table in `PROTOCOL_PREFERENCE`.
    pub fn preferred_protocol(&self) -> Option<Protocol> {
        Protocol::select_preferred(&self.supported_protocols)
    }

    /// Host/port pair to dial for a given protocol: native port for RPC
    /// variants, gateway port for HTTP variants.
    pub fn endpoint_for(&self, protocol: Protocol) -> (&str, u16) {
        if protocol.is_http() {
            (self.host.as_str(), self.port_gateway)
        } else {
            (self.host.as_str(), self.port)
        }
    }
}

/// Client-supplied input to `RegisterDevice`.
///
/// `device_id` is deliberately absent here: per the registration path, the
/// authoritative id is always derived from the probe's `GetHealth` response,
/// never accepted from the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDeviceRequest {
    pub alias: String,
    pub host: String,
    pub port: u16,
    pub port_gateway: u16,
    pub protocol: Protocol,
}

impl RegisterDeviceRequest {
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.host.trim().is_empty() {
            return Err(FleetError::InvalidArgument("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(FleetError::InvalidArgument(
                "port must be between 1 and 65535".into(),
            ));
        }
        if self.port_gateway == 0 {
            return Err(FleetError::InvalidArgument(
                "port_gateway must be between 1 and 65535".into(),
            ));
        }
        if matches!(self.protocol, Protocol::Unspecified) {
            return Err(FleetError::InvalidArgument("protocol must be specified".into()));
        }
        Ok(())
    }
}
