//! The three contracts the orchestrator is built against: a device client,
//! a persistence repository, and a change notifier. Concrete
//! implementations live in `fleet-client` and `fleet-store`; tests in this
//! crate use in-memory fakes of all three.

use std::pin::Pin;

use async_trait::async_trait;
use fleet_types::{Device, Diagnostic, DiagnosticSnapshot, DeviceStatus, FleetError, HealthInfo};
use futures::Stream;

/// A lazily-produced, finite sequence of diagnostic records — finite on
/// error or peer close, per the capability set in the device client
/// abstraction.
pub type DiagnosticStream = Pin<Box<dyn Stream<Item = Result<Diagnostic, FleetError>> + Send>>;

/// Polymorphic client over the {request/response, streaming} device
/// transports. One instance is bound to one device + one protocol variant;
/// the factory (in `fleet-client`) picks the concrete implementation.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn get_health(&self) -> Result<HealthInfo, FleetError>;

    async fn get_diagnostics(&self) -> Result<Diagnostic, FleetError>;

    /// Opens a server-streaming diagnostics sequence. Only meaningful for
    /// the `grpc-stream`/`http-stream` variants — polling clients may
    /// return `FleetError::InvalidArgument` if called.
    async fn stream_diagnostics(&self) -> Result<DiagnosticStream, FleetError>;

    async fn update_device(&self, status: DeviceStatus) -> Result<(), FleetError>;

    /// Idempotent: releases all underlying sockets/connections. Safe to
    /// call more than once.
    async fn close(&self) -> Result<(), FleetError>;
}

/// The persistence repository contract: device records and diagnostics.
/// Storage engine internals are out of scope — only this interface and the
/// notification channel semantics in [`ChangeNotifier`] are specified.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<Device>, FleetError>;

    async fn get_device(&self, device_id: &str) -> Result<Option<Device>, FleetError>;

    /// Upsert by `device_id`. The `INSERT` change event this produces is
    /// the signal that causes the orchestrator to spawn a worker.
    async fn upsert_device(
        &self,
        health: HealthInfo,
        alias: String,
        host: String,
        port: u16,
        port_gateway: u16,
    ) -> Result<Device, FleetError>;

    async fn write_diagnostic(&self, diagnostic: &Diagnostic) -> Result<(), FleetError>;

    async fn latest_snapshot(&self, device_id: &str) -> Result<Option<DiagnosticSnapshot>, FleetError>;
}

/// A single change-data-capture notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierEvent {
    pub channel: String,
    pub payload: String,
}

/// A lazy sequence of [`NotifierEvent`] values, closing iff its input token
/// is cancelled or an unrecoverable configuration error occurs — never on
/// a transient connection failure, which the implementation retries
/// internally.
pub type NotifierStream = Pin<Box<dyn Stream<Item = NotifierEvent> + Send>>;

/// Subscription to a named change-data-capture channel.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    /// Subscribe and get the event stream. Implementations own their own
    /// reconnect loop internally; this call itself should not block on
    /// connectivity beyond the first attempt.
    async fn subscribe(&self, cancel: tokio_util::sync::CancellationToken) -> NotifierStream;
}
