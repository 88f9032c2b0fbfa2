//! Client-facing surface: a `tonic` `Monitor` service and an `axum`
//! HTTP/JSON mirror over the same [`AppState`].

mod conv;
mod grpc_service;
mod http_service;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fleet_core::Repository;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

pub use grpc_service::MonitorService;
pub use state::AppState;

use fleet_proto::v1::monitor_server::MonitorServer;

/// Bring up the gRPC `Monitor` service and its `axum` mirror, both serving
/// the same repository. Returns once `cancel` fires and both servers have
/// shut down.
pub async fn serve(
    repository: Arc<dyn Repository>,
    stream_interval: Duration,
    grpc_addr: SocketAddr,
    http_addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let state = AppState::new(repository, stream_interval);

    let grpc_service = MonitorServer::new(MonitorService::new(state.clone()));
    let grpc_cancel = cancel.clone();
    let grpc = async move {
        tracing::info!(%grpc_addr, "starting gRPC monitor service");
        Server::builder()
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, grpc_cancel.cancelled())
            .await
    };

    let http_router = http_service::router(state);
    let http_cancel = cancel.clone();
    let http = async move {
        tracing::info!(%http_addr, "starting HTTP monitor mirror");
        let listener = tokio::net::TcpListener::bind(http_addr).await?;
        axum::serve(listener, http_router)
            .with_graceful_shutdown(http_cancel.cancelled_owned())
            .await
    };

    let (grpc_result, http_result) = tokio::join!(grpc, http);
    grpc_result?;
    http_result?;
    Ok(())
}
