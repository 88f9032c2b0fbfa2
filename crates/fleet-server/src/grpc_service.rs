//! `tonic` implementation of the `Monitor` service.

use std::pin::Pin;
use std::sync::Arc;

use fleet_types::{FleetError, RegisterDeviceRequest as DomainRegisterRequest};
use futures::{Stream, StreamExt};
use tonic::{Request, Response, Status};

use fleet_proto::v1::monitor_server::Monitor;
use fleet_proto::v1::{
    DiagnosticSnapshot as WireSnapshot, Empty, GetDiagnosticsRequest, GetDiagnosticsResponse, ListDevicesRequest,
    ListDevicesResponse, RegisterDeviceRequest, RegisterDeviceResponse, StreamDiagnosticsRequest, UpdateDeviceRequest,
};

use crate::conv::{device_status_from_wire, device_to_wire, protocol_from_wire, snapshot_to_wire};
use crate::state::AppState;

pub struct MonitorService {
    state: Arc<AppState>,
}

impl MonitorService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

fn fleet_error_to_status(e: FleetError) -> Status {
    match e {
        FleetError::NotFound(msg) => Status::not_found(msg),
        FleetError::InvalidArgument(msg) => Status::invalid_argument(msg),
        FleetError::NoSupportedProtocol(id) => Status::failed_precondition(format!("no supported protocol for {id}")),
        FleetError::Transport(msg) => Status::unavailable(msg),
        FleetError::Persistence(msg) => Status::internal(msg),
        FleetError::Cancelled => Status::cancelled("operation cancelled"),
        FleetError::Fatal(msg) => Status::internal(msg),
    }
}

#[tonic::async_trait]
impl Monitor for MonitorService {
    async fn register_device(
        &self,
        request: Request<RegisterDeviceRequest>,
    ) -> Result<Response<RegisterDeviceResponse>, Status> {
        let req = request.into_inner();
        let protocol = protocol_from_wire(req.protocol)
            .ok_or_else(|| Status::invalid_argument("unrecognized protocol"))?;

        let domain_req = DomainRegisterRequest {
            alias: req.alias.clone(),
            host: req.host.clone(),
            port: req.port as u16,
            port_gateway: req.port_gateway as u16,
            protocol,
        };
        domain_req.validate().map_err(fleet_error_to_status)?;

        let probe = fleet_client::build_probe_client(&domain_req.host, domain_req.port, domain_req.port_gateway, protocol)
            .map_err(fleet_error_to_status)?;
        let health = probe.get_health().await.map_err(fleet_error_to_status)?;

        let device = self
            .state
            .repository
            .upsert_device(health, domain_req.alias, domain_req.host, domain_req.port, domain_req.port_gateway)
            .await
            .map_err(fleet_error_to_status)?;

        Ok(Response::new(RegisterDeviceResponse {
            device: Some(device_to_wire(&device)),
        }))
    }

    async fn list_devices(
        &self,
        _request: Request<ListDevicesRequest>,
    ) -> Result<Response<ListDevicesResponse>, Status> {
        let mut devices = self.state.repository.list_devices().await.map_err(fleet_error_to_status)?;
        devices.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(Response::new(ListDevicesResponse {
            devices: devices.iter().map(device_to_wire).collect(),
        }))
    }

    async fn update_device(&self, request: Request<UpdateDeviceRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        let status = device_status_from_wire(req.status)?;

        let device = self
            .state
            .repository
            .get_device(&req.device_id)
            .await
            .map_err(fleet_error_to_status)?
            .ok_or_else(|| Status::not_found(format!("device {} not found", req.device_id)))?;

        let client = self
            .state
            .device_clients
            .get_or_insert_with(&device.device_id, || {
                fleet_client::build_client(&device).unwrap_or_else(|e| {
                    Arc::new(fleet_client::FailingClient::new(e.to_string())) as Arc<dyn fleet_core::DeviceClient>
                })
            })
            .await;
        if let Err(e) = client.update_device(status).await {
            self.state.device_clients.remove(&device.device_id).await;
            return Err(fleet_error_to_status(e));
        }

        Ok(Response::new(Empty {}))
    }

    async fn get_diagnostics(
        &self,
        request: Request<GetDiagnosticsRequest>,
    ) -> Result<Response<GetDiagnosticsResponse>, Status> {
        let device_id = request.into_inner().device_id;
        if device_id.trim().is_empty() {
            return Err(Status::invalid_argument("device_id must not be empty"));
        }

        let snapshot = self
            .state
            .repository
            .latest_snapshot(&device_id)
            .await
            .map_err(fleet_error_to_status)?
            .ok_or_else(|| Status::not_found(format!("no snapshot for device {device_id}")))?;

        Ok(Response::new(GetDiagnosticsResponse {
            snapshot: Some(snapshot_to_wire(&snapshot)),
        }))
    }

    type StreamDiagnosticsStream = Pin<Box<dyn Stream<Item = Result<WireSnapshot, Status>> + Send>>;

    async fn stream_diagnostics(
        &self,
        request: Request<StreamDiagnosticsRequest>,
    ) -> Result<Response<Self::StreamDiagnosticsStream>, Status> {
        let device_id = request.into_inner().device_id;
        let cancel = tokio_util::sync::CancellationToken::new();

        let inner = fleet_core::stream_diagnostics(
            device_id,
            self.state.repository.clone(),
            self.state.stream_interval,
            cancel,
        );

        let out = inner.map(|result| result.map(|s| snapshot_to_wire(&s)).map_err(fleet_error_to_status));
        Ok(Response::new(Box::pin(out)))
    }

    async fn get_health(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        Ok(Response::new(Empty {}))
    }
}
