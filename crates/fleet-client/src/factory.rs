//! Dispatches to the right transport implementation based on
//! [`Protocol`], dialing the native port for binary RPC and the gateway
//! port for HTTP, per [`fleet_types::Device::endpoint_for`].

use std::sync::Arc;

use fleet_core::DeviceClient;
use fleet_types::{Device, FleetError, Protocol};

use crate::grpc::GrpcDeviceClient;
use crate::http::HttpDeviceClient;

/// Builds the client a worker should use for `device`, bound to its
/// [`Device::preferred_protocol`].
pub fn build_client(device: &Device) -> Result<Arc<dyn DeviceClient>, FleetError> {
    let protocol = device
        .preferred_protocol()
        .ok_or_else(|| FleetError::NoSupportedProtocol(device.device_id.clone()))?;

    build_client_for(device, protocol)
}

/// Builds a client for an explicit protocol, bypassing preference
/// selection — used by the registration probe, which must try a specific
/// protocol the caller asked for.
pub fn build_client_for(device: &Device, protocol: Protocol) -> Result<Arc<dyn DeviceClient>, FleetError> {
    let (host, port) = device.endpoint_for(protocol);

    match protocol {
        Protocol::Grpc | Protocol::GrpcStream => {
            Ok(Arc::new(GrpcDeviceClient::new(host, port)?) as Arc<dyn DeviceClient>)
        }
        Protocol::Http | Protocol::HttpStream => {
            Ok(Arc::new(HttpDeviceClient::new(host, port)) as Arc<dyn DeviceClient>)
        }
        Protocol::Unspecified => Err(FleetError::InvalidArgument("protocol must be specified".into())),
    }
}

/// Builds a client directly from connection parameters, for the
/// registration path before a `Device` record exists.
pub fn build_probe_client(host: &str, port: u16, port_gateway: u16, protocol: Protocol) -> Result<Arc<dyn DeviceClient>, FleetError> {
    match protocol {
        Protocol::Grpc | Protocol::GrpcStream => {
            Ok(Arc::new(GrpcDeviceClient::new(host, port)?) as Arc<dyn DeviceClient>)
        }
        Protocol::Http | Protocol::HttpStream => {
            Ok(Arc::new(HttpDeviceClient::new(host, port_gateway)) as Arc<dyn DeviceClient>)
        }
        Protocol::Unspecified => Err(FleetError::InvalidArgument("protocol must be specified".into())),
    }
}
