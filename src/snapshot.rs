//! Read side: open a snapshot file and describe its tables.

use pack_migrate_core::models::{SourceFile, TableSchema};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::db::snapshot_options;
use crate::error::{MigrateError, Result};
use crate::warehouse::quote_sqlite;

/// An open, read-only snapshot.
pub struct Snapshot {
    file: SourceFile,
    pool: SqlitePool,
}

impl Snapshot {
    pub async fn open(file: SourceFile) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(snapshot_options(&file.path))
            .await
            .map_err(|source| MigrateError::SourceOpen {
                path: file.path.clone(),
                source,
            })?;
        Ok(Self { file, pool })
    }

    pub fn language(&self) -> &str {
        &self.file.language
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// User tables, ordered by name. SQLite's own `sqlite_*` tables are
    /// skipped.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|source| MigrateError::SourceOpen {
            path: self.file.path.clone(),
            source,
        })
    }

    /// Column names and declared types in ordinal order. A table with no
    /// columns is treated as missing.
    pub async fn schema(&self, table: &str) -> Result<TableSchema> {
        let rows = sqlx::query("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::schema_read(table, e))?;

        if rows.is_empty() {
            return Err(MigrateError::schema_read(table, "table is missing"));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .try_get("name")
                .map_err(|e| MigrateError::schema_read(table, e))?;
            let declared: String = row
                .try_get("type")
                .map_err(|e| MigrateError::schema_read(table, e))?;
            columns.push((name, declared));
        }

        Ok(TableSchema::new(table, columns))
    }

    pub async fn row_count(&self, table: &str) -> Result<i64> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_sqlite(table)))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::schema_read(table, e))
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
