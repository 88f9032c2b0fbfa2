//! Device-facing transport clients implementing `fleet_core::DeviceClient`:
//! a `tonic`-based binary RPC client for `grpc`/`grpc-stream` devices, a
//! `reqwest`-based JSON client for `http`/`http-stream` devices, a factory
//! that dispatches on `Protocol`, and a per-device client cache.

pub mod cache;
pub mod factory;
pub mod failing;
pub mod grpc;
pub mod http;

pub use cache::DeviceCache;
pub use factory::{build_client, build_client_for, build_probe_client};
pub use failing::FailingClient;
pub use grpc::GrpcDeviceClient;
pub use http::HttpDeviceClient;
