//! Destination store abstraction.
//!
//! The [`Warehouse`] trait is the only way the orchestrator and transfer
//! engine touch the destination. A single instance is built at startup by
//! [`crate::db::connect_warehouse`] and shared by every file job, so tests can
//! swap in a wrapper that injects failures at any step.
//!
//! | Backend | Type | Rename | Insert |
//! |---------|------|--------|--------|
//! | MariaDB | [`MariaDbWarehouse`] | `RENAME TABLE` | `INSERT IGNORE` |
//! | SQLite  | [`SqliteWarehouse`]  | `ALTER TABLE .. RENAME TO` | `INSERT OR IGNORE` |

pub mod mariadb;
pub mod sqlite;

use async_trait::async_trait;
use pack_migrate_core::models::{ColumnDef, Row};
use serde::Serialize;

pub use mariadb::MariaDbWarehouse;
pub use sqlite::SqliteWarehouse;

/// Table tracking when each language was last migrated.
pub const VERSION_TABLE: &str = "language_data_versions";

/// One row of [`VERSION_TABLE`], timestamps as Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageVersion {
    pub language: String,
    pub updated_at: i64,
    pub created_at: i64,
}

/// DDL and bulk-load operations against the destination store.
///
/// Operations return raw [`sqlx::Error`]s; the orchestrator wraps them with
/// the table and step they belong to.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Short backend name for logs (`"mariadb"`, `"sqlite"`).
    fn backend(&self) -> &'static str;

    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error>;

    /// `DROP TABLE IF EXISTS`.
    async fn drop_table(&self, table: &str) -> Result<(), sqlx::Error>;

    async fn rename_table(&self, from: &str, to: &str) -> Result<(), sqlx::Error>;

    /// Plain `CREATE TABLE`; fails if `table` already exists.
    async fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<(), sqlx::Error>;

    /// Open a transaction and prepare an insert-ignore statement for
    /// `columns` of `table`.
    async fn begin_load(
        &self,
        table: &str,
        columns: &[String],
    ) -> Result<Box<dyn TableLoader>, sqlx::Error>;

    async fn count_rows(&self, table: &str) -> Result<i64, sqlx::Error>;

    /// Create [`VERSION_TABLE`] if missing.
    async fn ensure_version_table(&self) -> Result<(), sqlx::Error>;

    /// Upsert the `updated_at` timestamp for `language`.
    async fn record_language_version(&self, language: &str) -> Result<(), sqlx::Error>;

    async fn language_versions(&self) -> Result<Vec<LanguageVersion>, sqlx::Error>;

    async fn close(&self);
}

/// An open destination transaction bound to one table.
///
/// Dropping a loader without calling [`commit`](TableLoader::commit) rolls
/// the transaction back.
#[async_trait]
pub trait TableLoader: Send {
    /// Execute the insert statement once per row, inside the transaction.
    /// Returns the number of rows actually inserted (duplicates are skipped).
    async fn insert_batch(&mut self, rows: &[Row]) -> Result<u64, sqlx::Error>;

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error>;

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error>;
}

/// Quote a MySQL identifier using backticks, doubling embedded backticks.
pub fn quote_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a SQLite identifier using double quotes, doubling embedded quotes.
pub fn quote_sqlite(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Comma-separated quoted column list.
pub(crate) fn column_list(columns: &[String], quote: fn(&str) -> String) -> String {
    columns
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `word="Haus", count=3`, for logging a row the warehouse refused.
pub(crate) fn describe_row(row: &Row) -> String {
    row.iter()
        .map(|(column, value)| format!("{}={}", column, value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `<verb> <table> (<cols>) VALUES (?, ?, ...)`.
pub(crate) fn insert_sql(
    verb: &str,
    table: &str,
    columns: &[String],
    quote: fn(&str) -> String,
) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "{} {} ({}) VALUES ({})",
        verb,
        quote(table),
        column_list(columns, quote),
        placeholders
    )
}
