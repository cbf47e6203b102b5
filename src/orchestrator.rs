//! Per-table replacement saga.
//!
//! A destination table is never dropped in place. The existing table is
//! first parked under `<dest>_old`, the replacement is created and filled
//! inside one transaction, and only then is the backup dropped. Any failure
//! after the backup step renames the backup back, so readers either see the
//! old table or the complete new one.
//!
//! ```text
//! Start ─┬─▶ Absent ───┬─▶ Created ─▶ Transferred ─▶ Committed
//!        └─▶ BackedUp ─┘      │             │
//!                             └──────┬──────┘
//!                                    ▼
//!                               RolledBack
//! ```

use pack_migrate_core::models::{MigrationJob, TableSchema};
use pack_migrate_core::naming::TableStyle;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Compensation, MigrateError, RestoreError, Result};
use crate::snapshot::Snapshot;
use crate::transfer::{self, TransferReport};
use crate::warehouse::Warehouse;

/// Saga states, in the order a successful migration visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Start,
    /// No destination table existed.
    Absent,
    /// The destination table was renamed to its backup name.
    BackedUp,
    Created,
    Transferred,
    Committed,
    RolledBack,
}

/// Where the pre-existing destination table lives while it is replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupState {
    pub destination_table: String,
    pub backup_table: String,
    pub existed_before: bool,
}

/// One table's migration, stepping through [`MigrationState`].
pub struct TableMigration<'a> {
    warehouse: &'a dyn Warehouse,
    job: MigrationJob,
    backup: BackupState,
    history: Vec<MigrationState>,
}

impl<'a> TableMigration<'a> {
    pub fn new(warehouse: &'a dyn Warehouse, job: MigrationJob) -> Self {
        let backup = BackupState {
            destination_table: job.destination_table.clone(),
            backup_table: job.backup_table(),
            existed_before: false,
        };
        Self {
            warehouse,
            job,
            backup,
            history: vec![MigrationState::Start],
        }
    }

    pub fn job(&self) -> &MigrationJob {
        &self.job
    }

    pub fn backup(&self) -> &BackupState {
        &self.backup
    }

    pub fn state(&self) -> MigrationState {
        self.history
            .last()
            .copied()
            .unwrap_or(MigrationState::Start)
    }

    /// Every state entered so far, starting with [`MigrationState::Start`].
    pub fn history(&self) -> &[MigrationState] {
        &self.history
    }

    fn advance(&mut self, next: MigrationState) {
        debug!(
            table = %self.backup.destination_table,
            from = ?self.state(),
            to = ?next,
            "migration state"
        );
        self.history.push(next);
    }

    fn warehouse_error(&self, action: &'static str, source: sqlx::Error) -> MigrateError {
        MigrateError::Warehouse {
            table: self.backup.destination_table.clone(),
            action,
            source,
        }
    }

    /// Park any existing destination table under its backup name.
    pub async fn prepare(&mut self) -> Result<()> {
        let dest = self.backup.destination_table.clone();
        let backup = self.backup.backup_table.clone();

        let mut exists = self
            .warehouse
            .table_exists(&dest)
            .await
            .map_err(|e| self.warehouse_error("check existence of", e))?;

        if !exists {
            // A run that died between rename and create leaves only the backup.
            let orphaned = self
                .warehouse
                .table_exists(&backup)
                .await
                .map_err(|e| self.warehouse_error("check existence of", e))?;
            if orphaned {
                warn!(table = %dest, backup = %backup, "recovering orphaned backup table");
                self.warehouse
                    .rename_table(&backup, &dest)
                    .await
                    .map_err(|e| self.warehouse_error("recover orphaned backup of", e))?;
                exists = true;
            }
        }

        if !exists {
            self.advance(MigrationState::Absent);
            return Ok(());
        }

        if let Err(e) = self.warehouse.drop_table(&backup).await {
            debug!(table = %backup, error = %e, "could not drop stale backup");
        }
        self.warehouse
            .rename_table(&dest, &backup)
            .await
            .map_err(|e| self.warehouse_error("back up", e))?;
        self.backup.existed_before = true;
        self.advance(MigrationState::BackedUp);
        Ok(())
    }

    pub async fn create(&mut self, schema: &TableSchema) -> Result<()> {
        let dest = self.backup.destination_table.clone();
        match self
            .warehouse
            .create_table(&dest, &schema.destination_columns())
            .await
        {
            Ok(()) => {
                self.advance(MigrationState::Created);
                Ok(())
            }
            Err(source) => {
                let compensation = self.restore().await;
                Err(MigrateError::TableCreate {
                    table: dest,
                    source,
                    compensation,
                })
            }
        }
    }

    pub async fn transfer(
        &mut self,
        snapshot: &Snapshot,
        schema: &TableSchema,
    ) -> Result<TransferReport> {
        let dest = self.backup.destination_table.clone();
        match transfer::transfer(snapshot, self.warehouse, schema, &dest).await {
            Ok(report) => {
                self.advance(MigrationState::Transferred);
                Ok(report)
            }
            Err(source) => {
                if let Err(e) = self.warehouse.drop_table(&dest).await {
                    warn!(table = %dest, error = %e, "could not drop partially created table");
                }
                let compensation = self.restore().await;
                Err(MigrateError::DataTransfer {
                    source,
                    compensation,
                })
            }
        }
    }

    /// Drop the backup. Failing to do so leaves a stray `_old` table but the
    /// migration itself has succeeded.
    pub async fn finish(&mut self) {
        if self.backup.existed_before {
            if let Err(e) = self.warehouse.drop_table(&self.backup.backup_table).await {
                warn!(
                    table = %self.backup.backup_table,
                    error = %e,
                    "backup table left behind"
                );
            }
        }
        self.advance(MigrationState::Committed);
    }

    /// Rename the backup back over the destination, if there is one.
    pub async fn restore(&mut self) -> Compensation {
        self.advance(MigrationState::RolledBack);
        if !self.backup.existed_before {
            return Compensation::NothingToRestore;
        }

        let BackupState {
            destination_table,
            backup_table,
            ..
        } = self.backup.clone();
        match self
            .warehouse
            .rename_table(&backup_table, &destination_table)
            .await
        {
            Ok(()) => {
                info!(table = %destination_table, "restored original table from backup");
                Compensation::Restored {
                    backup: backup_table,
                }
            }
            Err(source) => Compensation::RestoreFailed(RestoreError {
                table: destination_table,
                backup: backup_table,
                source,
            }),
        }
    }

    /// Drive the saga to [`MigrationState::Committed`] or
    /// [`MigrationState::RolledBack`].
    pub async fn run(&mut self, snapshot: &Snapshot, schema: &TableSchema) -> Result<TransferReport> {
        self.prepare().await?;
        self.create(schema).await?;
        let report = self.transfer(snapshot, schema).await?;
        self.finish().await;
        Ok(report)
    }
}

/// Outcome of one successfully migrated table.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub job: MigrationJob,
    pub rows: u64,
    pub inserted: u64,
    pub batches: u64,
    /// Whether a previous version of the table was replaced.
    pub replaced: bool,
    pub states: Vec<MigrationState>,
}

/// Migrate `source_table` of `snapshot` into its warehouse table.
pub async fn migrate_table(
    warehouse: &dyn Warehouse,
    snapshot: &Snapshot,
    source_table: &str,
    style: TableStyle,
) -> Result<TableReport> {
    let language = snapshot.language().to_string();
    let destination_table = style
        .destination_table(&language, source_table)
        .map_err(|source| MigrateError::TableName {
            table: source_table.to_string(),
            source,
        })?;

    let schema = snapshot.schema(source_table).await?;
    let job = MigrationJob {
        language,
        source_table: source_table.to_string(),
        destination_table,
    };

    info!(
        language = %job.language,
        source = %job.source_table,
        table = %job.destination_table,
        columns = schema.len(),
        "migrating table"
    );

    let mut migration = TableMigration::new(warehouse, job);
    let report = migration.run(snapshot, &schema).await?;

    info!(
        table = %migration.job().destination_table,
        rows = report.rows,
        batches = report.batches,
        "table migrated"
    );

    Ok(TableReport {
        replaced: migration.backup().existed_before,
        states: migration.history().to_vec(),
        job: migration.job,
        rows: report.rows,
        inserted: report.inserted,
        batches: report.batches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&MigrationState::RolledBack).unwrap();
        assert_eq!(json, "\"rolled_back\"");
    }
}
