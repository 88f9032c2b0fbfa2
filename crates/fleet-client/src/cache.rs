//! Per-device cache of connected transport clients, so a worker's next tick
//! reuses its open channel instead of redialing.
//!
//! Follows the `RwLock<HashMap<...>>` shape of the teacher's
//! `zmq::client_tracker::ClientTracker`: reads take the shared lock, and
//! mutation goes through a single `update`-with-closure entry point rather
//! than exposing the map directly.

use std::collections::HashMap;
use std::sync::Arc;

use fleet_core::DeviceClient;
use tokio::sync::RwLock;

/// Caches one live [`DeviceClient`] per device id.
#[derive(Default)]
pub struct DeviceCache {
    clients: RwLock<HashMap<String, Arc<dyn DeviceClient>>>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached client for `device_id`, if any.
    pub async fn get(&self, device_id: &str) -> Option<Arc<dyn DeviceClient>> {
        self.clients.read().await.get(device_id).cloned()
    }

    /// Returns the cached client, or builds and inserts one via `build` when
    /// absent. `build` runs under the write lock — keep it cheap, since
    /// concrete clients (`GrpcDeviceClient::new`) only open a lazy channel.
    pub async fn get_or_insert_with<F>(&self, device_id: &str, build: F) -> Arc<dyn DeviceClient>
    where
        F: FnOnce() -> Arc<dyn DeviceClient>,
    {
        if let Some(client) = self.get(device_id).await {
            return client;
        }
        let mut clients = self.clients.write().await;
        clients
            .entry(device_id.to_string())
            .or_insert_with(build)
            .clone()
    }

    /// Removes and returns the cached client for `device_id`, if any — used
    /// when a worker gives up and its client should be closed and rebuilt
    /// on the next attempt rather than reused.
    pub async fn remove(&self, device_id: &str) -> Option<Arc<dyn DeviceClient>> {
        self.clients.write().await.remove(device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fleet_types::{Diagnostic, DeviceStatus, FleetError, HealthInfo};

    struct FakeClient;

    #[async_trait]
    impl DeviceClient for FakeClient {
        async fn get_health(&self) -> Result<HealthInfo, FleetError> {
            unimplemented!()
        }
        async fn get_diagnostics(&self) -> Result<Diagnostic, FleetError> {
            unimplemented!()
        }
        async fn stream_diagnostics(&self) -> Result<fleet_core::traits::DiagnosticStream, FleetError> {
            unimplemented!()
        }
        async fn update_device(&self, _status: DeviceStatus) -> Result<(), FleetError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), FleetError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn get_or_insert_builds_once() {
        let cache = DeviceCache::new();
        let mut builds = 0;

        for _ in 0..3 {
            cache
                .get_or_insert_with("dev-1", || {
                    builds += 1;
                    Arc::new(FakeClient) as Arc<dyn DeviceClient>
                })
                .await;
        }

        assert_eq!(builds, 1);
    }

    #[tokio::test]
    async fn remove_evicts_entry() {
        let cache = DeviceCache::new();
        cache
            .get_or_insert_with("dev-1", || Arc::new(FakeClient) as Arc<dyn DeviceClient>)
            .await;
        assert!(cache.get("dev-1").await.is_some());
        cache.remove("dev-1").await;
        assert!(cache.get("dev-1").await.is_none());
    }
}
