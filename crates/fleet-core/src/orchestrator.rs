//! Reconciles the persisted device set with the live worker pool.
//!
//! Grounded on the original `orchestrator.go`'s `orchestrator.Run`: a
//! bootstrap scan of every persisted device followed by a steady-state loop
//! that starts a worker on every `INSERT` change event and tears one down
//! on every `DELETE`. Worker restart on protocol or endpoint change is
//! deliberately out of scope — there is no `UPDATE` change event at all.

use std::sync::Arc;

use fleet_types::{ChangeEvent, Operation};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::pool::WorkerPool;
use crate::traits::{ChangeNotifier, Repository};

/// Drives the pool from persisted state plus a live change feed until
/// `cancel` fires.
pub struct Orchestrator {
    repository: Arc<dyn Repository>,
    notifier: Arc<dyn ChangeNotifier>,
    pool: Arc<WorkerPool>,
}

impl Orchestrator {
    pub fn new(
        repository: Arc<dyn Repository>,
        notifier: Arc<dyn ChangeNotifier>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            repository,
            notifier,
            pool,
        }
    }

    /// Bootstrap scan followed by the steady-state event loop. Returns once
    /// `cancel` fires, after every worker has been stopped.
    pub async fn run(&self, cancel: CancellationToken) {
        if let Err(e) = self.bootstrap().await {
            error!(error = %e, "bootstrap device scan failed");
        }

        let mut events = self.notifier.subscribe(cancel.clone()).await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = futures::StreamExt::next(&mut events) => {
                    match event {
                        Some(event) => self.handle_notification(&event.payload).await,
                        None => {
                            warn!("change notifier stream closed, orchestrator idling until cancelled");
                            cancel.cancelled().await;
                            break;
                        }
                    }
                }
            }
        }

        info!("orchestrator shutting down, stopping all workers");
        self.pool.stop_all().await;
    }

    async fn bootstrap(&self) -> Result<(), fleet_types::FleetError> {
        let devices = self.repository.list_devices().await?;
        info!(count = devices.len(), "bootstrap scan found devices");
        for device in devices {
            self.pool.start(device).await;
        }
        Ok(())
    }

    /// Parses a raw notification payload and dispatches it. Malformed
    /// payloads are logged and skipped, never fatal (spec §7).
    async fn handle_notification(&self, payload: &str) {
        let event = match ChangeEvent::parse(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, payload, "skipping malformed change notification");
                return;
            }
        };
        self.handle_event(&event).await;
    }

    async fn handle_event(&self, event: &ChangeEvent) {
        match event.operation {
            Operation::Insert => match self.repository.get_device(&event.device_id).await {
                Ok(Some(device)) => self.pool.start(device).await,
                Ok(None) => warn!(
                    device_id = %event.device_id,
                    "insert event for a device that is no longer present"
                ),
                Err(e) => error!(device_id = %event.device_id, error = %e, "failed to load inserted device"),
            },
            Operation::Delete => {
                self.pool.stop(&event.device_id).await;
                info!(device_id = %event.device_id, "delete event, worker stopped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_stream::stream;
    use async_trait::async_trait;
    use fleet_types::{Device, Diagnostic, DiagnosticSnapshot, FleetError, HealthInfo, Protocol};

    use crate::traits::{DeviceClient, NotifierStream};
    use crate::worker::WorkerConfig;

    struct FakeClient;

    #[async_trait]
    impl DeviceClient for FakeClient {
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

    struct FakeRepository {
        devices: StdMutex<Vec<Device>>,
    }

    #[async_trait]
    impl Repository for FakeRepository {
        async fn list_devices(&self) -> Result<Vec<Device>, FleetError> {
            Ok(self.devices.lock().unwrap().clone())
        }
        async fn get_device(&self, device_id: &str) -> Result<Option<Device>, FleetError> {
            Ok(self
                .devices
                .lock()
                .unwrap()
                .iter()
                .find(|d| d.device_id == device_id)
                .cloned())
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

    struct FakeNotifier {
        events: StdMutex<Vec<ChangeEvent>>,
    }

    #[async_trait]
    impl ChangeNotifier for FakeNotifier {
        async fn subscribe(&self, _cancel: CancellationToken) -> NotifierStream {
            let events = self.events.lock().unwrap().clone();
            Box::pin(stream! {
                for event in events {
                    yield crate::traits::NotifierEvent {
                        channel: "device_changes".into(),
                        payload: serde_json::to_string(&event).unwrap(),
                    };
                }
            })
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

    #[tokio::test]
    async fn bootstrap_starts_a_worker_per_persisted_device() {
        let repository = Arc::new(FakeRepository {
            devices: StdMutex::new(vec![sample_device("dev-1"), sample_device("dev-2")]),
        });
        let notifier = Arc::new(FakeNotifier {
            events: StdMutex::new(vec![]),
        });
        let pool = Arc::new(WorkerPool::new(
            repository.clone() as Arc<dyn Repository>,
            Arc::new(|_: &Device| Arc::new(FakeClient) as Arc<dyn DeviceClient>),
            WorkerConfig::default(),
        ));

        let orchestrator = Orchestrator::new(repository, notifier, pool.clone());
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(async move { orchestrator.run(cancel2).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.running_count().await, 2);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(pool.running_count().await, 0);
    }

    #[tokio::test]
    async fn delete_event_stops_the_worker() {
        let repository = Arc::new(FakeRepository {
            devices: StdMutex::new(vec![sample_device("dev-1"), sample_device("dev-2")]),
        });
        let notifier = Arc::new(FakeNotifier {
            events: StdMutex::new(vec![ChangeEvent {
                operation: Operation::Delete,
                device_id: "dev-2".into(),
            }]),
        });
        let pool = Arc::new(WorkerPool::new(
            repository.clone() as Arc<dyn Repository>,
            Arc::new(|_: &Device| Arc::new(FakeClient) as Arc<dyn DeviceClient>),
            WorkerConfig::default(),
        ));

        let orchestrator = Orchestrator::new(repository, notifier, pool.clone());
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();

        let handle = tokio::spawn(async move { orchestrator.run(cancel2).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.running_count().await, 1);
        assert!(!pool.is_running("dev-2").await);

        cancel.cancel();
        handle.await.unwrap();
    }
}
