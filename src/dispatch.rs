//! One job per snapshot file, run on the [`WorkerPool`].
//!
//! Tables inside a file are migrated one after another; files run in
//! parallel up to the configured worker count. Failures are collected into
//! each file's [`FileReport`] and logged after every job has finished, so a
//! broken snapshot or table never stops its siblings.

use std::sync::Arc;

use pack_migrate_core::models::SourceFile;
use pack_migrate_core::naming::TableStyle;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::MigrationConfig;
use crate::error::MigrateError;
use crate::locator::Discovery;
use crate::orchestrator::{migrate_table, TableReport};
use crate::pool::WorkerPool;
use crate::progress::{MigrationProgressEvent, MigrationProgressReporter};
use crate::snapshot::Snapshot;
use crate::warehouse::{Warehouse, VERSION_TABLE};

/// Outcome of one snapshot file.
#[derive(Debug)]
pub struct FileReport {
    pub file: SourceFile,
    pub tables: Vec<TableReport>,
    pub errors: Vec<MigrateError>,
    pub version_recorded: bool,
}

impl FileReport {
    fn new(file: SourceFile) -> Self {
        Self {
            file,
            tables: Vec::new(),
            errors: Vec::new(),
            version_recorded: false,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Everything a run did, files sorted by path.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub files: Vec<FileReport>,
    /// Files skipped because their names could not be parsed.
    pub rejected: Vec<MigrateError>,
    /// Most file jobs that were in flight at once.
    pub peak_workers: usize,
}

/// Serializable per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub files: usize,
    pub files_failed: usize,
    pub tables_migrated: usize,
    pub tables_failed: usize,
    pub rows: u64,
    pub restore_failures: usize,
}

impl RunSummary {
    pub fn totals(&self) -> RunTotals {
        let mut totals = RunTotals {
            files: self.files.len(),
            files_failed: self.rejected.len(),
            ..RunTotals::default()
        };
        for file in &self.files {
            if !file.is_clean() {
                totals.files_failed += 1;
            }
            totals.tables_migrated += file.tables.len();
            totals.tables_failed += file.errors.len();
            totals.rows += file.rows();
            totals.restore_failures += file
                .errors
                .iter()
                .filter(|e| e.compensation().is_some_and(|c| c.is_restore_failure()))
                .count();
        }
        totals
    }

    pub fn errors(&self) -> impl Iterator<Item = &MigrateError> {
        self.rejected
            .iter()
            .chain(self.files.iter().flat_map(|f| f.errors.iter()))
    }
}

/// Migrate every discovered file on a pool of `config.workers` workers.
pub async fn migrate_files(
    warehouse: Arc<dyn Warehouse>,
    discovery: Discovery,
    config: &MigrationConfig,
    progress: Arc<dyn MigrationProgressReporter>,
) -> RunSummary {
    let pool = WorkerPool::new(config.workers);
    let style = config.table_style;
    let track_versions = config.track_versions;

    info!(
        files = discovery.files.len(),
        workers = pool.workers(),
        "dispatching snapshot jobs"
    );

    let mut files = pool
        .run(discovery.files, move |file: SourceFile| {
            let warehouse = Arc::clone(&warehouse);
            let progress = Arc::clone(&progress);
            async move {
                migrate_file(
                    warehouse.as_ref(),
                    file,
                    style,
                    track_versions,
                    progress.as_ref(),
                )
                .await
            }
        })
        .await;
    files.sort_by(|a, b| a.file.path.cmp(&b.file.path));
    debug!(peak = pool.peak_active(), "snapshot jobs drained");

    let summary = RunSummary {
        files,
        rejected: discovery.rejected,
        peak_workers: pool.peak_active(),
    };
    log_errors(&summary);
    summary
}

/// Migrate all tables of one snapshot, in name order.
pub async fn migrate_file(
    warehouse: &dyn Warehouse,
    file: SourceFile,
    style: TableStyle,
    track_versions: bool,
    progress: &dyn MigrationProgressReporter,
) -> FileReport {
    let mut report = FileReport::new(file.clone());
    info!(language = %file.language, path = %file.path.display(), "migrating snapshot");

    let snapshot = match Snapshot::open(file).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            report.errors.push(e);
            return report;
        }
    };

    let tables = match snapshot.list_tables().await {
        Ok(tables) => tables,
        Err(e) => {
            report.errors.push(e);
            snapshot.close().await;
            return report;
        }
    };

    let language = snapshot.language().to_string();
    let total = tables.len() as u64;
    progress.report(MigrationProgressEvent::FileStarted {
        language: language.clone(),
        tables: total,
    });

    for (i, table) in tables.iter().enumerate() {
        let (rows, ok) = match migrate_table(warehouse, &snapshot, table, style).await {
            Ok(table_report) => {
                let rows = table_report.rows;
                report.tables.push(table_report);
                (rows, true)
            }
            Err(e) => {
                report.errors.push(e);
                (0, false)
            }
        };
        progress.report(MigrationProgressEvent::TableFinished {
            language: language.clone(),
            table: table.clone(),
            rows,
            ok,
            n: i as u64 + 1,
            total,
        });
    }
    snapshot.close().await;

    if track_versions && report.is_clean() && !report.tables.is_empty() {
        match warehouse.record_language_version(&language).await {
            Ok(()) => report.version_recorded = true,
            Err(source) => report.errors.push(MigrateError::Warehouse {
                table: VERSION_TABLE.to_string(),
                action: "record version in",
                source,
            }),
        }
    }

    info!(
        language = %language,
        tables = report.tables.len(),
        errors = report.errors.len(),
        rows = report.rows(),
        "snapshot finished"
    );
    report
}

fn log_errors(summary: &RunSummary) {
    for err in &summary.rejected {
        warn!(error = %err, "snapshot skipped");
    }
    for file in &summary.files {
        for err in &file.errors {
            if err.compensation().is_some_and(|c| c.is_restore_failure()) {
                error!(language = %file.file.language, error = %err, "table left under its backup name");
            } else {
                warn!(language = %file.file.language, error = %err, "migration failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pack_migrate_core::naming::NamingError;
    use std::path::PathBuf;

    #[test]
    fn test_totals_count_rejected_and_failed_files() {
        let file = SourceFile {
            path: PathBuf::from("TranslationData_en.sqlite"),
            language: "en".into(),
        };
        let mut failed = FileReport::new(file);
        failed
            .errors
            .push(MigrateError::schema_read("nouns", "table is missing"));

        let summary = RunSummary {
            files: vec![failed],
            rejected: vec![MigrateError::FileName {
                path: PathBuf::from("garbage.sqlite"),
                source: NamingError::UnrecognizedFileName("garbage.sqlite".into()),
            }],
            peak_workers: 1,
        };
        let totals = summary.totals();
        assert_eq!(totals.files, 1);
        assert_eq!(totals.files_failed, 2);
        assert_eq!(totals.tables_failed, 1);
        assert_eq!(totals.tables_migrated, 0);
        assert_eq!(summary.errors().count(), 2);
    }
}
