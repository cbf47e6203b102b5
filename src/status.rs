//! Warehouse status overview.
//!
//! Lists every language recorded in the version table with when it was first
//! and last migrated. Used by `pack-migrate status` to confirm that a run
//! actually landed.

use crate::config::Config;
use crate::db;
use crate::error::{MigrateError, Result};
use crate::warehouse::VERSION_TABLE;

/// Run the status command: query the version table and print a summary.
pub async fn run_status(config: &Config) -> Result<()> {
    let warehouse = db::connect_warehouse(&config.warehouse).await?;

    let exists = warehouse
        .table_exists(VERSION_TABLE)
        .await
        .map_err(|source| MigrateError::Connection {
            target: config.warehouse.describe(),
            source,
        })?;

    println!("Pack Migrate: Warehouse Status");
    println!("==============================");
    println!();
    println!("  Warehouse:   {}", config.warehouse.describe());
    println!("  Snapshots:   {}", config.snapshots.dir.display());

    if !exists {
        println!();
        println!("  No version table yet; run `pack-migrate init` or `pack-migrate run`.");
        println!();
        warehouse.close().await;
        return Ok(());
    }

    let versions = warehouse
        .language_versions()
        .await
        .map_err(|source| MigrateError::Connection {
            target: config.warehouse.describe(),
            source,
        })?;
    println!("  Languages:   {}", versions.len());

    if !versions.is_empty() {
        let now = chrono::Utc::now().timestamp();
        println!();
        println!(
            "  {:<10} {:<22} {:<22} {}",
            "LANGUAGE", "FIRST MIGRATED", "LAST MIGRATED", "SINCE"
        );
        println!("  {}", "-".repeat(64));
        for v in &versions {
            println!(
                "  {:<10} {:<22} {:<22} {}",
                v.language,
                utc_timestamp(v.created_at),
                utc_timestamp(v.updated_at),
                since(now - v.updated_at)
            );
        }
    }

    println!();

    warehouse.close().await;
    Ok(())
}

fn utc_timestamp(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => ts.to_string(),
    }
}

/// Compact age of a version entry: `<1m`, `42m`, `3h 05m`, `12d 4h`.
fn since(seconds: i64) -> String {
    if seconds < 0 {
        return "-".to_string();
    }
    let age = chrono::Duration::seconds(seconds);
    match (age.num_days(), age.num_hours() % 24, age.num_minutes() % 60) {
        (0, 0, 0) => "<1m".to_string(),
        (0, 0, m) => format!("{}m", m),
        (0, h, m) => format!("{}h {:02}m", h, m),
        (d, h, _) => format!("{}d {}h", d, h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since() {
        assert_eq!(since(0), "<1m");
        assert_eq!(since(59), "<1m");
        assert_eq!(since(42 * 60 + 10), "42m");
        assert_eq!(since(3 * 3600 + 5 * 60), "3h 05m");
        assert_eq!(since(12 * 86400 + 4 * 3600 + 59), "12d 4h");
        assert_eq!(since(-5), "-");
    }

    #[test]
    fn test_utc_timestamp() {
        assert_eq!(utc_timestamp(0), "1970-01-01 00:00 UTC");
        assert_eq!(utc_timestamp(1_700_000_000), "2023-11-14 22:13 UTC");
    }
}
