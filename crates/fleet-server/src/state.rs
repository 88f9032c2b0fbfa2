//! Shared application state, following the teacher's `Arc<AppState>` +
//! `axum::State` idiom (see `hootenanny::web`).

use std::sync::Arc;
use std::time::Duration;

use fleet_client::DeviceCache;
use fleet_core::Repository;

pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub stream_interval: Duration,
    /// Caches the `UpdateDevice` transport client per device id, so repeated
    /// `UpdateDevice` calls for the same device reuse one open channel
    /// instead of dialing it fresh every request.
    pub device_clients: DeviceCache,
}

impl AppState {
    pub fn new(repository: Arc<dyn Repository>, stream_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            repository,
            stream_interval,
            device_clients: DeviceCache::new(),
        })
    }
}
