use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, Connection};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{Backend, WarehouseConfig};
use crate::error::{MigrateError, Result};
use crate::warehouse::{quote_mysql, MariaDbWarehouse, SqliteWarehouse, Warehouse};

/// Jobs queue on the single SQLite writer for at most this long.
const SQLITE_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(600);
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the one warehouse handle shared by every file job.
pub async fn connect_warehouse(config: &WarehouseConfig) -> Result<Arc<dyn Warehouse>> {
    let target = config.describe();
    let connection_error = |source: sqlx::Error| MigrateError::Connection {
        target: target.clone(),
        source,
    };

    let warehouse: Arc<dyn Warehouse> = match config.backend {
        Backend::Mariadb => {
            let params = config.mariadb_params()?;
            let server = MySqlConnectOptions::new()
                .host(params.host)
                .port(params.port)
                .username(params.user)
                .password(params.password);

            if config.create_database {
                let mut conn = MySqlConnection::connect_with(&server)
                    .await
                    .map_err(connection_error)?;
                sqlx::query(&format!(
                    "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci",
                    quote_mysql(params.name)
                ))
                .execute(&mut conn)
                .await
                .map_err(connection_error)?;
                conn.close().await.map_err(connection_error)?;
                info!(database = params.name, "ensured warehouse database exists");
            }

            let pool = MySqlPoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(server.database(params.name))
                .await
                .map_err(connection_error)?;
            Arc::new(MariaDbWarehouse::new(pool))
        }
        Backend::Sqlite => {
            let path = config.sqlite_path()?;

            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        MigrateError::Config(format!(
                            "cannot create directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }

            let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
                .map_err(connection_error)?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(SQLITE_BUSY_TIMEOUT);

            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(SQLITE_ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await
                .map_err(connection_error)?;
            Arc::new(SqliteWarehouse::new(pool))
        }
    };

    info!(warehouse = %target, backend = warehouse.backend(), "connected to warehouse");
    Ok(warehouse)
}

/// Connection options for a snapshot file: read-only, never created.
pub fn snapshot_options(path: &std::path::Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false)
        .disable_statement_logging()
}
