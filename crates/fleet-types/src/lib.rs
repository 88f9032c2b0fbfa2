//! Shared domain types for the fleet monitoring orchestrator: device
//! records, protocol/status sum types, diagnostics, change events, and the
//! error enum every other crate propagates.

pub mod build_info;
pub mod device;
pub mod diagnostic;
pub mod error;
pub mod event;
pub mod health;
pub mod protocol;

pub use build_info::BuildInfo;
pub use device::{Device, RegisterDeviceRequest};
pub use diagnostic::{Diagnostic, DiagnosticSnapshot, INVALID_CHECKSUM_SENTINEL};
pub use error::FleetError;
pub use event::{ChangeEvent, Operation};
pub use health::HealthInfo;
pub use protocol::{DeviceStatus, Protocol, PROTOCOL_PREFERENCE};
