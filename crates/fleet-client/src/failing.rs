//! A `DeviceClient` that always errors. Used where a caller needs an
//! infallible `Fn(&Device) -> Arc<dyn DeviceClient>` factory but the
//! underlying transport can fail to construct (e.g. an unparsable gRPC
//! endpoint URI); the worker then fails its first collection attempt,
//! retries, and ultimately gives up and records the device offline exactly
//! as it would for any other transport error.

use async_trait::async_trait;
use fleet_core::{DeviceClient, DiagnosticStream};
use fleet_types::{Diagnostic, DeviceStatus, FleetError, HealthInfo};

pub struct FailingClient {
    reason: String,
}

impl FailingClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl DeviceClient for FailingClient {
    async fn get_health(&self) -> Result<HealthInfo, FleetError> {
        Err(FleetError::Transport(self.reason.clone()))
    }

    async fn get_diagnostics(&self) -> Result<Diagnostic, FleetError> {
        Err(FleetError::Transport(self.reason.clone()))
    }

    async fn stream_diagnostics(&self) -> Result<DiagnosticStream, FleetError> {
        Err(FleetError::Transport(self.reason.clone()))
    }

    async fn update_device(&self, _status: DeviceStatus) -> Result<(), FleetError> {
        Err(FleetError::Transport(self.reason.clone()))
    }

    async fn close(&self) -> Result<(), FleetError> {
        Ok(())
    }
}
