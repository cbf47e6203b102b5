//! The `run` command: discover, migrate, summarize.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::db;
use crate::dispatch::{migrate_files, RunSummary};
use crate::error::{MigrateError, Result};
use crate::locator::{locate_snapshots, Discovery};
use crate::progress::{format_number, MigrationProgressEvent, MigrationProgressReporter};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// List what would be migrated without connecting to the warehouse.
    pub dry_run: bool,
    /// Restrict the run to these language codes; empty means all.
    pub languages: Vec<String>,
}

/// Run a migration and print the summary on stdout.
///
/// Only fatal errors are returned. Per-file and per-table failures are
/// logged and counted in the summary.
pub async fn run_migrate(
    config: &Config,
    options: &RunOptions,
    progress: Arc<dyn MigrationProgressReporter>,
) -> Result<RunSummary> {
    progress.report(MigrationProgressEvent::Discovering {
        dir: config.snapshots.dir.clone(),
    });
    let mut discovery = locate_snapshots(&config.snapshots)?;
    if !options.languages.is_empty() {
        discovery
            .files
            .retain(|f| options.languages.iter().any(|l| l == &f.language));
    }

    if options.dry_run {
        print_plan(&discovery).await;
        return Ok(RunSummary {
            rejected: discovery.rejected,
            ..RunSummary::default()
        });
    }

    let warehouse = db::connect_warehouse(&config.warehouse).await?;
    if config.migration.track_versions {
        warehouse
            .ensure_version_table()
            .await
            .map_err(|source| MigrateError::Connection {
                target: config.warehouse.describe(),
                source,
            })?;
    }

    let summary = migrate_files(
        Arc::clone(&warehouse),
        discovery,
        &config.migration,
        progress,
    )
    .await;
    warehouse.close().await;

    let totals = summary.totals();
    info!(
        files = totals.files,
        tables = totals.tables_migrated,
        failed = totals.tables_failed,
        rows = totals.rows,
        "migration run finished"
    );

    println!("migrate {}", config.snapshots.dir.display());
    println!("  files: {} ({} failed)", totals.files, totals.files_failed);
    println!("  tables migrated: {}", totals.tables_migrated);
    println!("  tables failed: {}", totals.tables_failed);
    println!("  rows copied: {}", format_number(totals.rows));
    if totals.restore_failures > 0 {
        println!(
            "  restore failures: {} (see log for tables left under their _old name)",
            totals.restore_failures
        );
    }
    println!("ok");

    Ok(summary)
}

async fn print_plan(discovery: &Discovery) {
    println!("migrate (dry-run)");
    println!("  files found: {}", discovery.files.len());
    for err in &discovery.rejected {
        println!("  skipped: {}", err);
    }
    for file in &discovery.files {
        println!("  {} [{}]", file.path.display(), file.language);
        let snapshot = match Snapshot::open(file.clone()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                println!("    error: {}", e);
                continue;
            }
        };
        match snapshot.list_tables().await {
            Ok(tables) => {
                for table in tables {
                    match snapshot.row_count(&table).await {
                        Ok(rows) => println!("    {:<32} {:>10} rows", table, rows),
                        Err(e) => println!("    {:<32} error: {}", table, e),
                    }
                }
            }
            Err(e) => println!("    error: {}", e),
        }
        snapshot.close().await;
    }
}
