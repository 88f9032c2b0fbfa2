//! `http`/`http-stream` device client: a `reqwest::Client` against the
//! device-facing JSON routes (`/v1/health`, `/v1/diagnostics`,
//! `/v1/diagnostics/stream`, `/v1/device`), grounded on the teacher's
//! `GpuMonitor` observer client — same `reqwest::Client` with a bounded
//! timeout, same GET-then-`.json()` shape.

use std::collections::HashSet;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use fleet_core::traits::DiagnosticStream;
use fleet_core::DeviceClient;
use fleet_types::{Diagnostic, DeviceStatus, FleetError, HealthInfo, Protocol};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

pub struct HttpDeviceClient {
    client: Client,
    base_url: String,
}

impl HttpDeviceClient {
    pub fn new(host: &str, port: u16) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: format!("http://{host}:{port}"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn not_found(&self) -> FleetError {
        FleetError::NotFound(format!("no device at {}", self.base_url))
    }
}

#[derive(Debug, Deserialize)]
struct HealthWire {
    device_id: String,
    architecture: String,
    os: String,
    supported_protocols: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DiagnosticWire {
    cpu_usage: f64,
    memory_usage: f64,
    device_status: String,
    hardware_version: String,
    software_version: String,
    firmware_version: String,
    checksum: String,
}

#[derive(Debug, Serialize)]
struct UpdateDeviceWire {
    status: String,
}

fn diagnostic_from_wire(device_id: &str, wire: DiagnosticWire) -> Result<Diagnostic, FleetError> {
    let device_status = DeviceStatus::from_str_internal(&wire.device_status)
        .ok_or_else(|| FleetError::Transport(format!("unrecognized device status {}", wire.device_status)))?;
    Ok(Diagnostic {
        device_id: device_id.to_string(),
        cpu_usage: wire.cpu_usage,
        memory_usage: wire.memory_usage,
        device_status,
        hardware_version: wire.hardware_version,
        software_version: wire.software_version,
        firmware_version: wire.firmware_version,
        checksum: wire.checksum,
        timestamp: chrono::Utc::now(),
    })
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn get_health(&self) -> Result<HealthInfo, FleetError> {
        let response = self
            .client
            .get(self.url("/v1/health"))
            .send()
            .await
            .map_err(|e| FleetError::Transport(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(self.not_found());
        }
        let wire: HealthWire = response
            .error_for_status()
            .map_err(|e| FleetError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| FleetError::Transport(e.to_string()))?;

        let supported_protocols: HashSet<Protocol> = wire
            .supported_protocols
            .iter()
            .filter_map(|s| Protocol::from_str_internal(s))
            .collect();

        Ok(HealthInfo {
            device_id: wire.device_id,
            architecture: wire.architecture,
            os: wire.os,
            supported_protocols,
        })
    }

    async fn get_diagnostics(&self) -> Result<Diagnostic, FleetError> {
        let response = self
            .client
            .get(self.url("/v1/diagnostics"))
            .send()
            .await
            .map_err(|e| FleetError::Transport(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(self.not_found());
        }
        let wire: DiagnosticWire = response
            .error_for_status()
            .map_err(|e| FleetError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| FleetError::Transport(e.to_string()))?;

        diagnostic_from_wire("", wire)
    }

    async fn stream_diagnostics(&self) -> Result<DiagnosticStream, FleetError> {
        let response = self
            .client
            .get(self.url("/v1/diagnostics/stream"))
            .send()
            .await
            .map_err(|e| FleetError::Transport(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(self.not_found());
        }
        let response = response
            .error_for_status()
            .map_err(|e| FleetError::Transport(e.to_string()))?;

        let mut bytes = response.bytes_stream();
        let mut buffer = String::new();

        let out: DiagnosticStream = Box::pin(stream! {
            loop {
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(idx) = buffer.find('\n') {
                            let line = buffer[..idx].trim().to_string();
                            buffer.drain(..=idx);
                            if line.is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<DiagnosticWire>(&line) {
                                Ok(wire) => yield diagnostic_from_wire("", wire),
                                Err(e) => {
                                    warn!(error = %e, "malformed diagnostic line, skipping");
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        yield Err(FleetError::Transport(e.to_string()));
                        return;
                    }
                    None => return,
                }
            }
        });

        Ok(out)
    }

    async fn update_device(&self, status: DeviceStatus) -> Result<(), FleetError> {
        let wire = UpdateDeviceWire {
            status: status.as_str().to_string(),
        };
        let response = self
            .client
            .patch(self.url("/v1/device"))
            .json(&wire)
            .send()
            .await
            .map_err(|e| FleetError::Transport(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(self.not_found());
        }
        response
            .error_for_status()
            .map_err(|e| FleetError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), FleetError> {
        // reqwest has no explicit teardown — connections return to the pool.
        Ok(())
    }
}
