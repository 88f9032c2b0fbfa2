//! Binds one device + one protocol to the strategy it requires, and wires
//! that strategy's outputs into the repository.
//!
//! Grounded on the original `worker.go`'s split between `WorkerPoll` and
//! `WorkerStream`: the protocol's [`fleet_types::Protocol::is_streaming`]
//! decides which strategy a worker runs, but both converge on the same
//! `Repository::write_diagnostic` / `Repository::upsert_device` sink.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fleet_types::{Device, Diagnostic, DeviceStatus, FleetError, Protocol};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::retry::RetryConfig;
use crate::traits::{DeviceClient, Repository};
use crate::{polling, streaming};

/// Parameters a worker needs beyond the device record itself.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub retry: RetryConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// Runs the collection strategy appropriate to `device.preferred_protocol()`
/// until `cancel` fires, or until the strategy itself gives up (streaming
/// exhausts its retries, or the device has no supported protocol at all).
///
/// `on_exit` runs exactly once, after the device client is closed and right
/// before this function returns — it's the pool's hook to remove its own
/// `WorkerHandle` entry when a worker winds down on its own rather than via
/// an explicit `stop()`.
pub async fn run<F, Fut>(
    device: Device,
    client: Arc<dyn DeviceClient>,
    repository: Arc<dyn Repository>,
    cancel: CancellationToken,
    config: WorkerConfig,
    on_exit: F,
) where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    let device_id = device.device_id.clone();
    let protocol = device.preferred_protocol();

    info!(device_id = %device_id, protocol = ?protocol, "worker starting");

    match protocol {
        Some(p) if p.is_streaming() => run_streaming(&device_id, client.clone(), repository, cancel, config).await,
        Some(_) => run_polling(&device_id, client.clone(), repository, cancel, config).await,
        None => {
            error!(device_id = %device_id, "worker has no supported protocol, exiting immediately");
        }
    }

    if let Err(e) = client.close().await {
        error!(device_id = %device_id, error = %e, "failed to close device client");
    }

    on_exit().await;

    info!(device_id = %device_id, "worker stopped");
}

async fn run_polling(
    device_id: &str,
    client: Arc<dyn DeviceClient>,
    repository: Arc<dyn Repository>,
    cancel: CancellationToken,
    config: WorkerConfig,
) {
    let poll_client = client.clone();
    let poll_repo = repository.clone();
    let poll_device_id = device_id.to_string();

    let poll = move || {
        let client = poll_client.clone();
        let repo = poll_repo.clone();
        let device_id = poll_device_id.clone();
        async move {
            let mut diagnostic = client.get_diagnostics().await?;
            diagnostic.device_id = device_id;
            repo.write_diagnostic(&diagnostic).await?;
            Ok::<(), FleetError>(())
        }
    };

    let giveup_repo = repository.clone();
    let giveup_device_id = device_id.to_string();
    let on_giveup = move || {
        let repo = giveup_repo.clone();
        let device_id = giveup_device_id.clone();
        async move {
            repo.write_diagnostic(&Diagnostic::offline(device_id)).await?;
            Ok::<(), FleetError>(())
        }
    };

    polling::run(device_id, cancel, config.poll_interval, config.retry, poll, on_giveup).await;
}

async fn run_streaming(
    device_id: &str,
    client: Arc<dyn DeviceClient>,
    repository: Arc<dyn Repository>,
    cancel: CancellationToken,
    config: WorkerConfig,
) {
    let open_client = client.clone();
    let open = move || {
        let client = open_client.clone();
        async move { client.stream_diagnostics().await }
    };

    let item_repo = repository.clone();
    let item_device_id = device_id.to_string();
    let on_item = move |mut diagnostic: Diagnostic| {
        let repo = item_repo.clone();
        let device_id = item_device_id.clone();
        async move {
            diagnostic.device_id = device_id;
            if let Err(e) = repo.write_diagnostic(&diagnostic).await {
                error!(error = %e, "failed to persist streamed diagnostic");
            }
        }
    };

    let giveup_repo = repository.clone();
    let giveup_device_id = device_id.to_string();
    let on_giveup = move || {
        let repo = giveup_repo.clone();
        let device_id = giveup_device_id.clone();
        async move {
            repo.write_diagnostic(&Diagnostic::offline(device_id)).await?;
            Ok::<(), FleetError>(())
        }
    };

    streaming::run(device_id, cancel, config.retry, open, on_item, on_giveup).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fleet_types::HealthInfo;

    struct FakeClient {
        diagnostics_calls: AtomicU32,
    }

    #[async_trait]
    impl DeviceClient for FakeClient {
        async fn get_health(&self) -> Result<HealthInfo, FleetError> {
            Ok(HealthInfo {
                device_id: "dev-1".into(),
                architecture: "arm64".into(),
                os: "linux".into(),
                supported_protocols: HashSet::from([Protocol::Grpc]),
            })
        }

        async fn get_diagnostics(&self) -> Result<Diagnostic, FleetError> {
            self.diagnostics_calls.fetch_add(1, Ordering::SeqCst);
            let mut d = Diagnostic::offline("dev-1");
            d.device_status = DeviceStatus::Healthy;
            d.checksum = "real-checksum".into();
            Ok(d)
        }

        async fn stream_diagnostics(&self) -> Result<crate::traits::DiagnosticStream, FleetError> {
            Err(FleetError::InvalidArgument("polling client does not stream".into()))
        }

        async fn update_device(&self, _status: DeviceStatus) -> Result<(), FleetError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), FleetError> {
            Ok(())
        }
    }

    struct FakeRepository {
        written: Mutex<Vec<Diagnostic>>,
    }

    #[async_trait]
    impl Repository for FakeRepository {
        async fn list_devices(&self) -> Result<Vec<Device>, FleetError> {
            Ok(vec![])
        }

        async fn get_device(&self, _device_id: &str) -> Result<Option<Device>, FleetError> {
            Ok(None)
        }

        async fn upsert_device(
            &self,
            _health: HealthInfo,
            _alias: String,
            _host: String,
            _port: u16,
            _port_gateway: u16,
        ) -> Result<Device, FleetError> {
            unimplemented!("not exercised by worker tests")
        }

        async fn write_diagnostic(&self, diagnostic: &Diagnostic) -> Result<(), FleetError> {
            self.written.lock().unwrap().push(diagnostic.clone());
            Ok(())
        }

        async fn latest_snapshot(&self, _device_id: &str) -> Result<Option<fleet_types::DiagnosticSnapshot>, FleetError> {
            Ok(None)
        }
    }

    fn sample_device() -> Device {
        let now = chrono::Utc::now();
        Device {
            id: 1,
            device_id: "dev-1".into(),
            alias: "r1".into(),
            host: "h".into(),
            port: 8084,
            port_gateway: 8085,
            architecture: "arm64".into(),
            os: "linux".into(),
            supported_protocols: HashSet::from([Protocol::Grpc]),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn polling_worker_persists_diagnostics_and_stops_on_cancel() {
        let client: Arc<dyn DeviceClient> = Arc::new(FakeClient {
            diagnostics_calls: AtomicU32::new(0),
        });
        let repo = Arc::new(FakeRepository {
            written: Mutex::new(vec![]),
        });
        let cancel = CancellationToken::new();

        let config = WorkerConfig {
            poll_interval: Duration::from_millis(5),
            retry: RetryConfig {
                initial: Duration::from_millis(1),
                max: Duration::from_millis(5),
                multiplier: 2.0,
                max_retries: 1,
                timeout: Duration::from_millis(50),
                heartbeat_timeout: Duration::from_secs(1),
            },
        };

        let cancel2 = cancel.clone();
        let handle = tokio::spawn(run(
            sample_device(),
            client,
            repo.clone() as Arc<dyn Repository>,
            cancel,
            config,
            || async {},
        ));

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel2.cancel();
        handle.await.unwrap();

        assert!(!repo.written.lock().unwrap().is_empty());
    }
}
