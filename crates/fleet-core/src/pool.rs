//! Tracks one running worker task per device.
//!
//! Grounded on the original `orchestrator.go`'s `pool` map together with the
//! teacher's `zmq::client_tracker::ClientTracker` idiom: a
//! `Mutex`-guarded map keyed by device id, entries removed by the worker
//! itself on exit rather than by a supervisor polling `JoinHandle`s.
//!
//! Invariants (spec §4.4):
//! (i) at most one worker per device id at any time;
//! (ii) `start` is a no-op if a worker for that id is already running;
//! (iii) `stop` cancels the worker's token and awaits its exit before
//!       returning;
//! (iv) a worker that exits on its own (client permanently closed, fatal
//!      error) removes itself from the map without requiring `stop`.

use std::collections::HashMap;
use std::sync::Arc;

use fleet_types::Device;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::traits::{DeviceClient, Repository};
use crate::worker::{self, WorkerConfig};

struct WorkerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Owns the set of live per-device workers.
pub struct WorkerPool {
    workers: Arc<Mutex<HashMap<String, WorkerHandle>>>,
    repository: Arc<dyn Repository>,
    client_factory: Arc<dyn Fn(&Device) -> Arc<dyn DeviceClient> + Send + Sync>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(
        repository: Arc<dyn Repository>,
        client_factory: Arc<dyn Fn(&Device) -> Arc<dyn DeviceClient> + Send + Sync>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            workers: Arc::new(Mutex::new(HashMap::new())),
            repository,
            client_factory,
            config,
        }
    }

    /// Starts a worker for `device` unless one is already running for its
    /// `device_id`. No-op in the already-running case — this is what
    /// resolves the at-most-once registration race without any
    /// persistence-level locking (spec §9).
    pub async fn start(&self, device: Device) {
        let mut workers = self.workers.lock().await;
        if workers.contains_key(&device.device_id) {
            debug!(device_id = %device.device_id, "worker already running, ignoring start");
            return;
        }

        let device_id = device.device_id.clone();
        let cancel = CancellationToken::new();
        let client = (self.client_factory)(&device);
        let repository = self.repository.clone();
        let config = self.config.clone();
        let worker_cancel = cancel.clone();

        let removal_workers = self.workers.clone();
        let removal_device_id = device_id.clone();
        let on_exit = move || {
            let workers = removal_workers;
            let device_id = removal_device_id;
            async move {
                workers.lock().await.remove(&device_id);
            }
        };

        let join = tokio::spawn(worker::run(device, client, repository, worker_cancel, config, on_exit));

        workers.insert(device_id, WorkerHandle { cancel, join });
    }

    /// Cancels and awaits the worker for `device_id`, if running.
    pub async fn stop(&self, device_id: &str) {
        let handle = self.workers.lock().await.remove(device_id);
        if let Some(handle) = handle {
            handle.cancel.cancel();
            let _ = handle.join.await;
            info!(device_id, "worker stopped and removed from pool");
        }
    }

    /// Cancels and awaits every running worker. Used on shutdown.
    pub async fn stop_all(&self) {
        let handles: Vec<(String, WorkerHandle)> = {
            let mut workers = self.workers.lock().await;
            workers.drain().collect()
        };
        for (device_id, handle) in handles {
            handle.cancel.cancel();
            let _ = handle.join.await;
            debug!(device_id, "worker stopped during shutdown");
        }
    }

    pub async fn is_running(&self, device_id: &str) -> bool {
        self.workers.lock().await.contains_key(device_id)
    }

    pub async fn running_count(&self) -> usize {
        self.workers.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use fleet_types::{Diagnostic, DiagnosticSnapshot, FleetError, HealthInfo, Protocol};

    struct NoopClient;

    #[async_trait]
    impl DeviceClient for NoopClient {
        async fn get_health(&self) -> Result<HealthInfo, FleetError> {
            unimplemented!()
        }
        async fn get_diagnostics(&self) -> Result<Diagnostic, FleetError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
        async fn stream_diagnostics(&self) -> Result<crate::traits::DiagnosticStream, FleetError> {
            unimplemented!()
        }
        async fn update_device(&self, _status: fleet_types::DeviceStatus) -> Result<(), FleetError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), FleetError> {
            Ok(())
        }
    }

    struct NoopRepository;

    #[async_trait]
    impl Repository for NoopRepository {
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
            unimplemented!()
        }
        async fn write_diagnostic(&self, _diagnostic: &Diagnostic) -> Result<(), FleetError> {
            Ok(())
        }
        async fn latest_snapshot(&self, _device_id: &str) -> Result<Option<DiagnosticSnapshot>, FleetError> {
            Ok(None)
        }
    }

    fn sample_device(id: &str) -> Device {
        let now = chrono::Utc::now();
        Device {
            id: 1,
            device_id: id.into(),
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

    fn pool() -> WorkerPool {
        WorkerPool::new(
            Arc::new(NoopRepository),
            Arc::new(|_: &Device| Arc::new(NoopClient) as Arc<dyn DeviceClient>),
            WorkerConfig::default(),
        )
    }

    #[tokio::test]
    async fn starting_twice_for_same_device_is_a_noop() {
        let pool = pool();
        pool.start(sample_device("dev-1")).await;
        pool.start(sample_device("dev-1")).await;
        assert_eq!(pool.running_count().await, 1);
        pool.stop_all().await;
    }

    #[tokio::test]
    async fn stop_removes_and_awaits_worker() {
        let pool = pool();
        pool.start(sample_device("dev-1")).await;
        assert!(pool.is_running("dev-1").await);
        pool.stop("dev-1").await;
        assert!(!pool.is_running("dev-1").await);
    }

    #[tokio::test]
    async fn distinct_devices_get_distinct_workers() {
        let pool = pool();
        pool.start(sample_device("dev-1")).await;
        pool.start(sample_device("dev-2")).await;
        assert_eq!(pool.running_count().await, 2);
        pool.stop_all().await;
        assert_eq!(pool.running_count().await, 0);
    }
}
