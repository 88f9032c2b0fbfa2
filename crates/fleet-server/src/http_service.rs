//! HTTP/JSON mirror of the `Monitor` service, for callers that prefer REST
//! over gRPC. Follows the teacher's `axum::Router` + `Arc<AppState>` +
//! extractor shape (see `hootenanny::web::router`).

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use fleet_types::{Device, DeviceStatus, DiagnosticSnapshot, FleetError, Protocol, RegisterDeviceRequest};

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/healthz", get(healthz))
        .route("/v1/devices", post(register_device).get(list_devices))
        .route("/v1/devices/{device_id}", patch(update_device))
        .route("/v1/devices/{device_id}/diagnostics", get(get_diagnostics))
        .route("/v1/devices/{device_id}/diagnostics/stream", get(stream_diagnostics))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct RegisterDeviceBody {
    alias: String,
    host: String,
    port: u16,
    port_gateway: u16,
    protocol: Protocol,
}

#[derive(Debug, Serialize)]
struct DeviceBody {
    device_id: String,
    alias: String,
    host: String,
    port: u16,
    port_gateway: u16,
    architecture: String,
    os: String,
    supported_protocols: Vec<Protocol>,
}

impl From<&Device> for DeviceBody {
    fn from(device: &Device) -> Self {
        Self {
            device_id: device.device_id.clone(),
            alias: device.alias.clone(),
            host: device.host.clone(),
            port: device.port,
            port_gateway: device.port_gateway,
            architecture: device.architecture.clone(),
            os: device.os.clone(),
            supported_protocols: device.supported_protocols.iter().copied().collect(),
        }
    }
}

fn fleet_error_to_response(e: FleetError) -> Response {
    let status = match &e {
        FleetError::NotFound(_) => StatusCode::NOT_FOUND,
        FleetError::InvalidArgument(_) | FleetError::NoSupportedProtocol(_) => StatusCode::BAD_REQUEST,
        FleetError::Transport(_) => StatusCode::BAD_GATEWAY,
        FleetError::Persistence(_) | FleetError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FleetError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, e.to_string()).into_response()
}

async fn register_device(State(state): State<Arc<AppState>>, Json(body): Json<RegisterDeviceBody>) -> Response {
    let req = RegisterDeviceRequest {
        alias: body.alias,
        host: body.host,
        port: body.port,
        port_gateway: body.port_gateway,
        protocol: body.protocol,
    };
    if let Err(e) = req.validate() {
        return fleet_error_to_response(e);
    }

    let probe = match fleet_client::build_probe_client(&req.host, req.port, req.port_gateway, req.protocol) {
        Ok(probe) => probe,
        Err(e) => return fleet_error_to_response(e),
    };
    let health = match probe.get_health().await {
        Ok(health) => health,
        Err(e) => return fleet_error_to_response(e),
    };

    match state
        .repository
        .upsert_device(health, req.alias, req.host, req.port, req.port_gateway)
        .await
    {
        Ok(device) => (StatusCode::CREATED, Json(DeviceBody::from(&device))).into_response(),
        Err(e) => fleet_error_to_response(e),
    }
}

async fn list_devices(State(state): State<Arc<AppState>>) -> Response {
    match state.repository.list_devices().await {
        Ok(mut devices) => {
            devices.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Json(devices.iter().map(DeviceBody::from).collect::<Vec<_>>()).into_response()
        }
        Err(e) => fleet_error_to_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct UpdateDeviceBody {
    status: DeviceStatus,
}

async fn update_device(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    Json(body): Json<UpdateDeviceBody>,
) -> Response {
    let device = match state.repository.get_device(&device_id).await {
        Ok(Some(device)) => device,
        Ok(None) => return fleet_error_to_response(FleetError::NotFound(device_id)),
        Err(e) => return fleet_error_to_response(e),
    };

    let client = state
        .device_clients
        .get_or_insert_with(&device.device_id, || {
            fleet_client::build_client(&device).unwrap_or_else(|e| {
                Arc::new(fleet_client::FailingClient::new(e.to_string())) as Arc<dyn fleet_core::DeviceClient>
            })
        })
        .await;

    match client.update_device(body.status).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            state.device_clients.remove(&device.device_id).await;
            fleet_error_to_response(e)
        }
    }
}

async fn get_diagnostics(State(state): State<Arc<AppState>>, Path(device_id): Path<String>) -> Response {
    match state.repository.latest_snapshot(&device_id).await {
        Ok(Some(snapshot)) => Json(snapshot).into_response(),
        Ok(None) => fleet_error_to_response(FleetError::NotFound(format!("no snapshot for device {device_id}"))),
        Err(e) => fleet_error_to_response(e),
    }
}

async fn stream_diagnostics(State(state): State<Arc<AppState>>, Path(device_id): Path<String>) -> Response {
    let cancel = tokio_util::sync::CancellationToken::new();
    let stream = fleet_core::stream_diagnostics(device_id, state.repository.clone(), state.stream_interval, cancel);

    let body_stream = stream.map(|result| -> Result<String, std::io::Error> {
        let snapshot: DiagnosticSnapshot = result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "fan-out error surfaced to HTTP stream, this should not happen");
            DiagnosticSnapshot {
                device_id: String::new(),
                alias: String::new(),
                host: String::new(),
                cpu_usage: 0.0,
                memory_usage: 0.0,
                device_status: DeviceStatus::Offline,
                hardware_version: String::new(),
                software_version: String::new(),
                firmware_version: String::new(),
                checksum: "invalid-checksum".into(),
                timestamp: chrono::Utc::now(),
            }
        });
        let mut line = serde_json::to_string(&snapshot).expect("DiagnosticSnapshot always serializes");
        line.push('\n');
        Ok(line)
    });

    Response::builder()
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(body_stream))
        .expect("static headers, always a valid response")
}
