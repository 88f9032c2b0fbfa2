//! `Repository` over a `sqlx::PgPool`, matching the logical schema in
//! `migrations/0001_init.sql`.
//!
//! Grounded on the original `postgres.repository.go`'s pool-holding struct
//! shape; queries themselves are this crate's own, since the original left
//! the device/diagnostic queries as stubs.

use std::collections::HashSet;

use async_trait::async_trait;
use fleet_core::traits::Repository;
use fleet_types::{Device, Diagnostic, DiagnosticSnapshot, DeviceStatus, FleetError, HealthInfo, Protocol};
use sqlx::PgPool;
use sqlx::Row;

pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), FleetError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| FleetError::Persistence(e.to_string()))
    }
}

fn protocols_to_columns(protocols: &HashSet<Protocol>) -> Vec<String> {
    protocols.iter().map(|p| p.as_str().to_string()).collect()
}

fn protocols_from_columns(columns: &[String]) -> HashSet<Protocol> {
    columns.iter().filter_map(|s| Protocol::from_str_internal(s)).collect()
}

fn device_from_row(row: &sqlx::postgres::PgRow) -> Result<Device, FleetError> {
    let port: i32 = row.try_get("port").map_err(persistence_err)?;
    let port_gateway: i32 = row.try_get("port_gateway").map_err(persistence_err)?;
    let protocol_columns: Vec<String> = row.try_get("supported_protocols").map_err(persistence_err)?;

    Ok(Device {
        id: row.try_get("id").map_err(persistence_err)?,
        device_id: row.try_get("device_id").map_err(persistence_err)?,
        alias: row.try_get("alias").map_err(persistence_err)?,
        host: row.try_get("host").map_err(persistence_err)?,
        port: port as u16,
        port_gateway: port_gateway as u16,
        architecture: row.try_get("architecture").map_err(persistence_err)?,
        os: row.try_get("os").map_err(persistence_err)?,
        supported_protocols: protocols_from_columns(&protocol_columns),
        created_at: row.try_get("created_at").map_err(persistence_err)?,
        updated_at: row.try_get("updated_at").map_err(persistence_err)?,
    })
}

fn snapshot_from_row(row: &sqlx::postgres::PgRow) -> Result<DiagnosticSnapshot, FleetError> {
    let device_status_str: String = row.try_get("device_status").map_err(persistence_err)?;
    let device_status = DeviceStatus::from_str_internal(&device_status_str)
        .ok_or_else(|| FleetError::Persistence(format!("unrecognized device_status {device_status_str}")))?;

    Ok(DiagnosticSnapshot {
        device_id: row.try_get("device_id").map_err(persistence_err)?,
        alias: row.try_get("alias").map_err(persistence_err)?,
        host: row.try_get("host").map_err(persistence_err)?,
        cpu_usage: row.try_get("cpu_usage").map_err(persistence_err)?,
        memory_usage: row.try_get("memory_usage").map_err(persistence_err)?,
        device_status,
        hardware_version: row.try_get("hardware_version").map_err(persistence_err)?,
        software_version: row.try_get("software_version").map_err(persistence_err)?,
        firmware_version: row.try_get("firmware_version").map_err(persistence_err)?,
        checksum: row.try_get("checksum").map_err(persistence_err)?,
        timestamp: row.try_get("timestamp").map_err(persistence_err)?,
    })
}

fn persistence_err(e: sqlx::Error) -> FleetError {
    FleetError::Persistence(e.to_string())
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_devices(&self) -> Result<Vec<Device>, FleetError> {
        let rows = sqlx::query("SELECT * FROM devices ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(persistence_err)?;
        rows.iter().map(device_from_row).collect()
    }

    async fn get_device(&self, device_id: &str) -> Result<Option<Device>, FleetError> {
        let row = sqlx::query("SELECT * FROM devices WHERE device_id = $1")
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence_err)?;
        row.as_ref().map(device_from_row).transpose()
    }

    /// Upsert keyed by `device_id`, per the registration path's
    /// health-derived-id-wins rule: `health.device_id` is always
    /// authoritative, never the caller-supplied id.
    async fn upsert_device(
        &self,
        health: HealthInfo,
        alias: String,
        host: String,
        port: u16,
        port_gateway: u16,
    ) -> Result<Device, FleetError> {
        let protocol_columns = protocols_to_columns(&health.supported_protocols);

        let row = sqlx::query(
            r#"
            INSERT INTO devices (device_id, alias, host, port, port_gateway, architecture, os, supported_protocols)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (device_id) DO UPDATE SET
                alias = EXCLUDED.alias,
                host = EXCLUDED.host,
                port = EXCLUDED.port,
                port_gateway = EXCLUDED.port_gateway,
                architecture = EXCLUDED.architecture,
                os = EXCLUDED.os,
                supported_protocols = EXCLUDED.supported_protocols,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(&health.device_id)
        .bind(&alias)
        .bind(&host)
        .bind(port as i32)
        .bind(port_gateway as i32)
        .bind(&health.architecture)
        .bind(&health.os)
        .bind(&protocol_columns)
        .fetch_one(&self.pool)
        .await
        .map_err(persistence_err)?;

        device_from_row(&row)
    }

    async fn write_diagnostic(&self, diagnostic: &Diagnostic) -> Result<(), FleetError> {
        sqlx::query(
            r#"
            INSERT INTO device_diagnostics
                (device_id, cpu_usage, memory_usage, device_status, hardware_version, software_version, firmware_version, checksum, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&diagnostic.device_id)
        .bind(diagnostic.cpu_usage)
        .bind(diagnostic.memory_usage)
        .bind(diagnostic.device_status.as_str())
        .bind(&diagnostic.hardware_version)
        .bind(&diagnostic.software_version)
        .bind(&diagnostic.firmware_version)
        .bind(&diagnostic.checksum)
        .bind(diagnostic.timestamp)
        .execute(&self.pool)
        .await
        .map_err(persistence_err)?;
        Ok(())
    }

    async fn latest_snapshot(&self, device_id: &str) -> Result<Option<DiagnosticSnapshot>, FleetError> {
        let row = sqlx::query("SELECT * FROM device_diagnostics_snapshot WHERE device_id = $1")
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(persistence_err)?;
        row.as_ref().map(snapshot_from_row).transpose()
    }
}
