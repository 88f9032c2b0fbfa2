//! Conversions between the `fleet-types` domain model and the
//! `fleet-proto` wire messages used by the client-facing `Monitor` service.

use std::collections::HashSet;

use fleet_types::{Device, DiagnosticSnapshot, DeviceStatus, Protocol};
use tonic::Status;

use fleet_proto::v1::{
    Device as WireDevice, DeviceStatus as WireDeviceStatus, DiagnosticSnapshot as WireSnapshot,
    Protocol as WireProtocol,
};

pub fn protocol_to_wire(p: Protocol) -> WireProtocol {
    match p {
        Protocol::Http => WireProtocol::Http,
        Protocol::HttpStream => WireProtocol::HttpStream,
        Protocol::Grpc => WireProtocol::Grpc,
        Protocol::GrpcStream => WireProtocol::GrpcStream,
        Protocol::Unspecified => WireProtocol::Unspecified,
    }
}

pub fn protocol_from_wire(p: i32) -> Option<Protocol> {
    match WireProtocol::try_from(p).ok()? {
        WireProtocol::Http => Some(Protocol::Http),
        WireProtocol::HttpStream => Some(Protocol::HttpStream),
        WireProtocol::Grpc => Some(Protocol::Grpc),
        WireProtocol::GrpcStream => Some(Protocol::GrpcStream),
        WireProtocol::Unspecified => Some(Protocol::Unspecified),
    }
}

pub fn device_status_to_wire(s: DeviceStatus) -> WireDeviceStatus {
    match s {
        DeviceStatus::Healthy => WireDeviceStatus::Healthy,
        DeviceStatus::Degraded => WireDeviceStatus::Degraded,
        DeviceStatus::Error => WireDeviceStatus::Error,
        DeviceStatus::Maintenance => WireDeviceStatus::Maintenance,
        DeviceStatus::Booting => WireDeviceStatus::Booting,
        DeviceStatus::Offline => WireDeviceStatus::Offline,
    }
}

pub fn device_status_from_wire(s: i32) -> Result<DeviceStatus, Status> {
    match WireDeviceStatus::try_from(s).map_err(|_| Status::invalid_argument("unrecognized device status"))? {
        WireDeviceStatus::Healthy => Ok(DeviceStatus::Healthy),
        WireDeviceStatus::Degraded => Ok(DeviceStatus::Degraded),
        WireDeviceStatus::Error => Ok(DeviceStatus::Error),
        WireDeviceStatus::Maintenance => Ok(DeviceStatus::Maintenance),
        WireDeviceStatus::Booting => Ok(DeviceStatus::Booting),
        WireDeviceStatus::Offline => Ok(DeviceStatus::Offline),
        WireDeviceStatus::Unspecified => Err(Status::invalid_argument("device status must be specified")),
    }
}

pub fn device_to_wire(device: &Device) -> WireDevice {
    WireDevice {
        device_id: device.device_id.clone(),
        alias: device.alias.clone(),
        host: device.host.clone(),
        port: device.port as u32,
        port_gateway: device.port_gateway as u32,
        architecture: device.architecture.clone(),
        os: device.os.clone(),
        supported_protocols: device
            .supported_protocols
            .iter()
            .copied()
            .map(|p| protocol_to_wire(p) as i32)
            .collect(),
        created_at_unix_ms: device.created_at.timestamp_millis(),
        updated_at_unix_ms: device.updated_at.timestamp_millis(),
    }
}

pub fn snapshot_to_wire(snapshot: &DiagnosticSnapshot) -> WireSnapshot {
    WireSnapshot {
        device_id: snapshot.device_id.clone(),
        alias: snapshot.alias.clone(),
        host: snapshot.host.clone(),
        cpu_usage: snapshot.cpu_usage,
        memory_usage: snapshot.memory_usage,
        device_status: device_status_to_wire(snapshot.device_status) as i32,
        hardware_version: snapshot.hardware_version.clone(),
        software_version: snapshot.software_version.clone(),
        firmware_version: snapshot.firmware_version.clone(),
        checksum: snapshot.checksum.clone(),
        timestamp_unix_ms: snapshot.timestamp.timestamp_millis(),
    }
}

pub fn protocols_from_wire(protocols: &[i32]) -> HashSet<Protocol> {
    protocols.iter().copied().filter_map(protocol_from_wire).collect()
}
