mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_config::FleetConfig;
use fleet_core::{Orchestrator, WorkerConfig, WorkerPool};
use fleet_store::{PostgresNotifier, PostgresRepository};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// fleetd — fleet monitoring orchestrator
///
/// Polls and streams diagnostics from a fleet of network devices over
/// gRPC or HTTP and makes the latest snapshot per device available over a
/// client-facing Monitor service.
///
/// Configuration is loaded from (in order, later wins):
/// 1. Compiled defaults
/// 2. /etc/fleet-monitor/config.toml
/// 3. ~/.config/fleet-monitor/config.toml
/// 4. ./fleet-monitor.toml (or --config path)
/// 5. Environment variables
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (overrides ./fleet-monitor.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show loaded configuration and exit
    #[arg(long)]
    show_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = FleetConfig::load_with_sources_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    if cli.show_config {
        println!("# Configuration sources:");
        for path in &sources.files {
            println!("#   - {}", path.display());
        }
        if !sources.env_overrides.is_empty() {
            println!("# Environment overrides:");
            for var in &sources.env_overrides {
                println!("#   - {}", var);
            }
        }
        println!();
        println!("{}", config.to_toml());
        return Ok(());
    }

    telemetry::init(&config.telemetry.log_level, config.telemetry.log_format)
        .context("failed to initialize logging")?;

    let build_info = fleet_types::BuildInfo::current();
    info!(
        version = build_info.version,
        revision = build_info.revision,
        branch = build_info.branch,
        build_date = build_info.build_date,
        "fleetd starting"
    );

    info!("configuration loaded from:");
    for path in &sources.files {
        info!("   - {}", path.display());
    }
    if !sources.env_overrides.is_empty() {
        info!(overrides = ?sources.env_overrides, "environment overrides applied");
    }

    info!("connecting to postgres...");
    let pool = PgPoolOptions::new()
        .max_connections(config.persistence.postgres.max_pool_size)
        .connect(&config.persistence.postgres.connection_string)
        .await
        .context("failed to connect to postgres")?;

    let repository = Arc::new(PostgresRepository::new(pool.clone()));
    repository.run_migrations().await.context("failed to run migrations")?;
    info!("migrations applied");

    let notifier = Arc::new(PostgresNotifier::new(
        pool,
        config.persistence.postgres.notification_channel.clone(),
    ));

    let worker_config = WorkerConfig {
        poll_interval: config.stream_interval(),
        ..WorkerConfig::default()
    };

    let pool_repository = repository.clone() as Arc<dyn fleet_core::Repository>;
    let worker_pool = Arc::new(WorkerPool::new(
        pool_repository.clone(),
        Arc::new(|device: &fleet_types::Device| {
            fleet_client::build_client(device).unwrap_or_else(|e| {
                tracing::error!(device_id = %device.device_id, error = %e, "failed to build device client");
                Arc::new(fleet_client::FailingClient::new(e.to_string())) as Arc<dyn fleet_core::DeviceClient>
            })
        }),
        worker_config,
    ));

    let orchestrator = Orchestrator::new(
        pool_repository,
        notifier as Arc<dyn fleet_core::ChangeNotifier>,
        worker_pool,
    );

    let cancel = CancellationToken::new();

    let grpc_addr: SocketAddr = format!("0.0.0.0:{}", config.network.port)
        .parse()
        .context("invalid client-facing port")?;
    let http_addr: SocketAddr = format!("{}:{}", config.network.gateway_host, config.network.gateway_port)
        .parse()
        .context("invalid gateway bind address")?;

    let server_cancel = cancel.clone();
    let server_repository = repository.clone() as Arc<dyn fleet_core::Repository>;
    let stream_interval = config.stream_interval();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = fleet_server::serve(server_repository, stream_interval, grpc_addr, http_addr, server_cancel).await
        {
            tracing::error!(error = %e, "client-facing server exited with an error");
        }
    });

    info!(%grpc_addr, %http_addr, "fleetd ready");

    let orchestrator_cancel = cancel.clone();
    let orchestrator_handle = tokio::spawn(async move { orchestrator.run(orchestrator_cancel).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            std::future::pending::<()>().await;
        } => {
            info!("received SIGTERM, shutting down");
        }
    }

    cancel.cancel();
    let _ = orchestrator_handle.await;
    let _ = server_handle.await;

    info!("shutdown complete");
    Ok(())
}
