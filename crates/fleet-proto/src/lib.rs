//! Generated stubs for the `fleet.v1` package: shared messages, the
//! client-facing `Monitor` service, and the device-facing `DeviceAgent`
//! service. `fleet-server` implements `Monitor`; `fleet-client` dials
//! `DeviceAgent` as a client against `grpc`/`grpc-stream` devices.

pub mod v1 {
    tonic::include_proto!("fleet.v1");
}

pub mod agent_v1 {
    tonic::include_proto!("fleet.agent.v1");
}
