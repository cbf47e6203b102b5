use crate::config::Config;
use crate::db;
use crate::error::{MigrateError, Result};
use crate::warehouse::VERSION_TABLE;

/// Connect to the warehouse (creating the database if configured) and make
/// sure the version table exists.
pub async fn run_init(config: &Config) -> Result<()> {
    let warehouse = db::connect_warehouse(&config.warehouse).await?;

    warehouse
        .ensure_version_table()
        .await
        .map_err(|source| MigrateError::Connection {
            target: config.warehouse.describe(),
            source,
        })?;

    println!(
        "Warehouse initialized: {} ({} ready)",
        config.warehouse.describe(),
        VERSION_TABLE
    );

    warehouse.close().await;
    Ok(())
}
