//! Batched row copy from a snapshot table into a warehouse table.
//!
//! The whole copy for one table runs inside a single destination
//! transaction: rows are streamed from the snapshot, buffered up to
//! [`BATCH_SIZE`], and each full buffer is pushed through the warehouse's
//! insert-ignore statement. Nothing is committed until the source cursor is
//! exhausted, so a failure at any point leaves the destination table empty.

use futures_util::TryStreamExt;
use pack_migrate_core::models::{Row, TableSchema, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, TypeInfo, ValueRef};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::TransferError;
use crate::snapshot::Snapshot;
use crate::warehouse::{column_list, quote_sqlite, Warehouse};

/// Rows buffered before each insert round.
pub const BATCH_SIZE: usize = 5000;

/// Counters for one committed table copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Rows read from the snapshot.
    pub rows: u64,
    /// Rows the warehouse accepted; lower than `rows` when duplicates were
    /// ignored.
    pub inserted: u64,
    pub batches: u64,
}

/// Copy every row of `schema.table` into `dest_table`, which must already
/// exist with matching columns.
pub async fn transfer(
    snapshot: &Snapshot,
    warehouse: &dyn Warehouse,
    schema: &TableSchema,
    dest_table: &str,
) -> Result<TransferReport, TransferError> {
    let fail = |source: sqlx::Error| TransferError {
        table: dest_table.to_string(),
        source,
    };

    let mut loader = warehouse
        .begin_load(dest_table, schema.column_names())
        .await
        .map_err(fail)?;

    match copy_rows(snapshot, loader.as_mut(), schema, dest_table).await {
        Ok(report) => {
            loader.commit().await.map_err(fail)?;
            Ok(report)
        }
        Err(source) => {
            if let Err(e) = loader.rollback().await {
                warn!(table = dest_table, error = %e, "rollback failed");
            }
            Err(fail(source))
        }
    }
}

async fn copy_rows(
    snapshot: &Snapshot,
    loader: &mut dyn crate::warehouse::TableLoader,
    schema: &TableSchema,
    dest_table: &str,
) -> Result<TransferReport, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM {}",
        column_list(schema.column_names(), quote_sqlite),
        quote_sqlite(&schema.table)
    );
    let columns = schema.shared_column_names();
    let mut report = TransferReport::default();
    let mut batch: Vec<Row> = Vec::with_capacity(BATCH_SIZE);

    let mut cursor = sqlx::query(&sql).fetch(snapshot.pool());
    while let Some(row) = cursor.try_next().await? {
        batch.push(decode_row(&row, &columns)?);
        report.rows += 1;

        if batch.len() >= BATCH_SIZE {
            flush(loader, &mut batch, &mut report, dest_table).await?;
        }
    }

    if !batch.is_empty() {
        flush(loader, &mut batch, &mut report, dest_table).await?;
    }

    Ok(report)
}

async fn flush(
    loader: &mut dyn crate::warehouse::TableLoader,
    batch: &mut Vec<Row>,
    report: &mut TransferReport,
    dest_table: &str,
) -> Result<(), sqlx::Error> {
    report.inserted += loader.insert_batch(batch).await?;
    report.batches += 1;
    debug!(
        table = dest_table,
        batch = report.batches,
        rows = batch.len(),
        "batch inserted"
    );
    batch.clear();
    Ok(())
}

fn decode_row(row: &SqliteRow, columns: &Arc<[String]>) -> Result<Row, sqlx::Error> {
    let mut values = Vec::with_capacity(columns.len());
    for index in 0..columns.len() {
        values.push(decode_value(row, index)?);
    }
    Ok(Row::new(Arc::clone(columns), values))
}

/// Decode one cell by its stored SQLite storage class.
fn decode_value(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let value = match storage_class.as_str() {
        "INTEGER" => Value::Integer(row.try_get_unchecked(index)?),
        "REAL" => Value::Real(row.try_get_unchecked(index)?),
        "TEXT" => Value::Text(row.try_get_unchecked(index)?),
        _ => Value::from_bytes(row.try_get_unchecked(index)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_decode_storage_classes() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let row = sqlx::query(
            "SELECT NULL, 42, 1.5, 'Haus', CAST('Baum' AS BLOB), X'FF00'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(decode_value(&row, 0).unwrap(), Value::Null);
        assert_eq!(decode_value(&row, 1).unwrap(), Value::Integer(42));
        assert_eq!(decode_value(&row, 2).unwrap(), Value::Real(1.5));
        assert_eq!(decode_value(&row, 3).unwrap(), Value::Text("Haus".into()));
        // UTF-8 blobs become text; anything else stays raw.
        assert_eq!(decode_value(&row, 4).unwrap(), Value::Text("Baum".into()));
        assert_eq!(decode_value(&row, 5).unwrap(), Value::Bytes(vec![0xFF, 0x00]));
    }
}
