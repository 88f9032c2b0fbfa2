//! Response shape for a device's `GetHealth`, used on the registration path.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::protocol::Protocol;

/// What a device reports about itself when probed during registration (or
/// periodically, for the polling strategy's `poll` action).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthInfo {
    /// Authoritative device identifier — wins over any client-supplied one
    /// on a registration conflict.
    pub device_id: String,
    pub architecture: String,
    pub os: String,
    pub supported_protocols: HashSet<Protocol>,
}
