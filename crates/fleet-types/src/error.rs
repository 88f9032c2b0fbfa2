//! The error kinds observable across the orchestrator, shaped after
//! `hooteconf::ConfigError`.

use thiserror::Error;

/// Errors surfaced by fleet components.
///
/// Propagation policy (see each call site): strategies recover `Transport`
/// internally via retry/backoff; workers recover `Persistence` by logging
/// and abandoning the tick; the pool recovers a worker's terminal error by
/// self-removal; the orchestrator recovers malformed events by logging and
/// skipping. `Cancelled` is never logged as an error. Only `Fatal` is meant
/// to propagate out of `fleetd::main`.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no supported protocol for device {0}")]
    NoSupportedProtocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("cancelled")]
    Cancelled,

    #[error("fatal: {0}")]
    Fatal(String),
}

impl FleetError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FleetError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FleetError::NotFound(_))
    }
}
