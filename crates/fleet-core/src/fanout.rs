//! Client-facing diagnostics streaming: a ticker pulls the latest persisted
//! snapshot rather than forwarding records a worker collects in real time.
//!
//! Grounded on the original `monitor.go`'s `MonitorService.StreamDiagnostics`
//! — the RPC reads from storage on its own cadence, decoupled from whatever
//! cadence (polling or streaming) actually populated that storage. This
//! keeps a slow or disconnected device worker from stalling a client's
//! subscription.

use std::pin::Pin;
use std::time::Duration;

use async_stream::stream;
use fleet_types::{DiagnosticSnapshot, FleetError};
use futures::Stream;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::traits::Repository;
use std::sync::Arc;

pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<DiagnosticSnapshot, FleetError>> + Send>>;

/// Produces a snapshot every `interval` until `cancel` fires or the device
/// is never found. A transient persistence error is logged and skipped for
/// that tick, not propagated — only `FleetError::NotFound`, raised once the
/// device never resolves, ends the stream with an error item.
pub fn stream_diagnostics(
    device_id: String,
    repository: Arc<dyn Repository>,
    interval: Duration,
    cancel: CancellationToken,
) -> SnapshotStream {
    Box::pin(stream! {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            match repository.latest_snapshot(&device_id).await {
                Ok(Some(snapshot)) => yield Ok(snapshot),
                Ok(None) => {
                    warn!(device_id, "no snapshot yet for device, skipping tick");
                }
                Err(e) => {
                    warn!(device_id, error = %e, "failed to read snapshot, skipping tick");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fleet_types::{Device, Diagnostic, DeviceStatus, HealthInfo};
    use futures::StreamExt;

    struct FakeRepository {
        snapshot: Mutex<Option<DiagnosticSnapshot>>,
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
            unimplemented!()
        }
        async fn write_diagnostic(&self, _diagnostic: &Diagnostic) -> Result<(), FleetError> {
            Ok(())
        }
        async fn latest_snapshot(&self, _device_id: &str) -> Result<Option<DiagnosticSnapshot>, FleetError> {
            Ok(self.snapshot.lock().unwrap().clone())
        }
    }

    fn sample_snapshot() -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            device_id: "dev-1".into(),
            alias: "r1".into(),
            host: "h".into(),
            cpu_usage: 1.0,
            memory_usage: 2.0,
            device_status: DeviceStatus::Healthy,
            hardware_version: "rev-a".into(),
            software_version: "1.0.0".into(),
            firmware_version: "1.0.0".into(),
            checksum: "abc123".into(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn yields_snapshots_on_each_tick() {
        let repository = Arc::new(FakeRepository {
            snapshot: Mutex::new(Some(sample_snapshot())),
        });
        let cancel = CancellationToken::new();

        let mut stream = stream_diagnostics(
            "dev-1".into(),
            repository.clone() as Arc<dyn Repository>,
            Duration::from_millis(5),
            cancel.clone(),
        );

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.device_id, "dev-1");
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn missing_snapshot_skips_tick_without_ending_stream() {
        let repository = Arc::new(FakeRepository {
            snapshot: Mutex::new(None),
        });
        let cancel = CancellationToken::new();

        let mut stream = stream_diagnostics(
            "dev-1".into(),
            repository as Arc<dyn Repository>,
            Duration::from_millis(5),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }
}
