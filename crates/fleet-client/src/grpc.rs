//! `grpc`/`grpc-stream` device client: a `tonic` channel against the
//! `DeviceAgent` service generated in `fleet-proto`.
//!
//! Connection setup follows `reitermarkus-mayastor-control-plane`'s
//! `tonic::transport::Endpoint::connect` idiom; the reconnect/backoff
//! behavior itself lives one layer up, in the polling/streaming strategies.

use std::collections::HashSet;

use async_stream::stream;
use async_trait::async_trait;
use fleet_core::traits::DiagnosticStream;
use fleet_core::DeviceClient;
use fleet_types::{Diagnostic, DeviceStatus, FleetError, HealthInfo, Protocol};
use futures::StreamExt;
use tokio::sync::Mutex;
use tonic::transport::Channel;
use tracing::warn;

use fleet_proto::agent_v1::device_agent_client::DeviceAgentClient;
use fleet_proto::agent_v1::{GetDiagnosticsRequest, GetHealthRequest, StreamDiagnosticsRequest, UpdateDeviceRequest};
use fleet_proto::v1::{DeviceStatus as WireDeviceStatus, Protocol as WireProtocol};

fn protocol_from_wire(p: i32) -> Option<Protocol> {
    match WireProtocol::try_from(p).ok()? {
        WireProtocol::Http => Some(Protocol::Http),
        WireProtocol::HttpStream => Some(Protocol::HttpStream),
        WireProtocol::Grpc => Some(Protocol::Grpc),
        WireProtocol::GrpcStream => Some(Protocol::GrpcStream),
        WireProtocol::Unspecified => Some(Protocol::Unspecified),
    }
}

fn status_to_wire(status: DeviceStatus) -> WireDeviceStatus {
    match status {
        DeviceStatus::Healthy => WireDeviceStatus::Healthy,
        DeviceStatus::Degraded => WireDeviceStatus::Degraded,
        DeviceStatus::Error => WireDeviceStatus::Error,
        DeviceStatus::Maintenance => WireDeviceStatus::Maintenance,
        DeviceStatus::Booting => WireDeviceStatus::Booting,
        DeviceStatus::Offline => WireDeviceStatus::Offline,
    }
}

/// `codes.NotFound` is a distinguished client error (spec-equivalent to an
/// HTTP 404); every other gRPC status collapses into a transport error.
fn status_to_fleet_error(status: tonic::Status) -> FleetError {
    if status.code() == tonic::Code::NotFound {
        FleetError::NotFound(status.message().to_string())
    } else {
        FleetError::Transport(status.to_string())
    }
}

fn status_from_wire(p: i32) -> Option<DeviceStatus> {
    match WireDeviceStatus::try_from(p).ok()? {
        WireDeviceStatus::Healthy => Some(DeviceStatus::Healthy),
        WireDeviceStatus::Degraded => Some(DeviceStatus::Degraded),
        WireDeviceStatus::Error => Some(DeviceStatus::Error),
        WireDeviceStatus::Maintenance => Some(DeviceStatus::Maintenance),
        WireDeviceStatus::Booting => Some(DeviceStatus::Booting),
        WireDeviceStatus::Offline => Some(DeviceStatus::Offline),
        WireDeviceStatus::Unspecified => None,
    }
}

pub struct GrpcDeviceClient {
    inner: Mutex<DeviceAgentClient<Channel>>,
}

impl GrpcDeviceClient {
    /// Lazily-connecting channel: `connect_lazy` defers the actual TCP
    /// handshake to the first RPC, so constructing this client never blocks.
    pub fn new(host: &str, port: u16) -> Result<Self, FleetError> {
        let endpoint = tonic::transport::Endpoint::from_shared(format!("http://{host}:{port}"))
            .map_err(|e| FleetError::InvalidArgument(e.to_string()))?;
        let channel = endpoint.connect_lazy();
        Ok(Self {
            inner: Mutex::new(DeviceAgentClient::new(channel)),
        })
    }
}

#[async_trait]
impl DeviceClient for GrpcDeviceClient {
    async fn get_health(&self) -> Result<HealthInfo, FleetError> {
        let mut client = self.inner.lock().await;
        let response = client
            .get_health(GetHealthRequest {})
            .await
            .map_err(status_to_fleet_error)?
            .into_inner();

        let supported_protocols: HashSet<Protocol> = response
            .supported_protocols
            .into_iter()
            .filter_map(protocol_from_wire)
            .collect();

        Ok(HealthInfo {
            device_id: response.device_id,
            architecture: response.architecture,
            os: response.os,
            supported_protocols,
        })
    }

    async fn get_diagnostics(&self) -> Result<Diagnostic, FleetError> {
        let mut client = self.inner.lock().await;
        let response = client
            .get_diagnostics(GetDiagnosticsRequest {})
            .await
            .map_err(status_to_fleet_error)?
            .into_inner();

        let diagnostic = response
            .diagnostic
            .ok_or_else(|| FleetError::Transport("response missing diagnostic payload".into()))?;

        let device_status = status_from_wire(diagnostic.device_status)
            .ok_or_else(|| FleetError::Transport("unrecognized device status".into()))?;

        Ok(Diagnostic {
            device_id: String::new(),
            cpu_usage: diagnostic.cpu_usage,
            memory_usage: diagnostic.memory_usage,
            device_status,
            hardware_version: diagnostic.hardware_version,
            software_version: diagnostic.software_version,
            firmware_version: diagnostic.firmware_version,
            checksum: diagnostic.checksum,
            timestamp: chrono::Utc::now(),
        })
    }

    async fn stream_diagnostics(&self) -> Result<DiagnosticStream, FleetError> {
        let mut client = self.inner.lock().await;
        let mut inbound = client
            .stream_diagnostics(StreamDiagnosticsRequest {})
            .await
            .map_err(status_to_fleet_error)?
            .into_inner();

        let out: DiagnosticStream = Box::pin(stream! {
            loop {
                match inbound.next().await {
                    Some(Ok(item)) => {
                        match status_from_wire(item.device_status) {
                            Some(device_status) => yield Ok(Diagnostic {
                                device_id: String::new(),
                                cpu_usage: item.cpu_usage,
                                memory_usage: item.memory_usage,
                                device_status,
                                hardware_version: item.hardware_version,
                                software_version: item.software_version,
                                firmware_version: item.firmware_version,
                                checksum: item.checksum,
                                timestamp: chrono::Utc::now(),
                            }),
                            None => warn!("unrecognized device status in stream item, skipping"),
                        }
                    }
                    Some(Err(status)) => {
                        yield Err(status_to_fleet_error(status));
                        return;
                    }
                    None => return,
                }
            }
        });

        Ok(out)
    }

    async fn update_device(&self, status: DeviceStatus) -> Result<(), FleetError> {
        let mut client = self.inner.lock().await;
        client
            .update_device(UpdateDeviceRequest {
                status: status_to_wire(status) as i32,
            })
            .await
            .map_err(status_to_fleet_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), FleetError> {
        // tonic channels close their connection on drop; nothing to do eagerly.
        Ok(())
    }
}
