//! SQLite warehouse backend.
//!
//! Used for local runs and the test suite. The pool is expected to hold a
//! single connection (see [`crate::db::connect_warehouse`]) so concurrent
//! file jobs queue for the writer instead of failing with `SQLITE_BUSY`.

use async_trait::async_trait;
use pack_migrate_core::models::{ColumnDef, Row, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool};
use sqlx::{Row as _, Transaction};
use tracing::warn;

use super::{describe_row, insert_sql, quote_sqlite, LanguageVersion, TableLoader, Warehouse};

/// [`Warehouse`] over a [`SqlitePool`].
pub struct SqliteWarehouse {
    pool: SqlitePool,
}

impl SqliteWarehouse {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn create_table_sql(table: &str, columns: &[ColumnDef]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_sqlite(&c.name), c.data_type))
        .collect();
    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_sqlite(table),
        defs.join(",\n    ")
    )
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Integer(v) => query.bind(*v),
        Value::Real(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    async fn drop_table(&self, table: &str) -> Result<(), sqlx::Error> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_sqlite(table)))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rename_table(&self, from: &str, to: &str) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_sqlite(from),
            quote_sqlite(to)
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<(), sqlx::Error> {
        sqlx::query(&create_table_sql(table, columns))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn begin_load(
        &self,
        table: &str,
        columns: &[String],
    ) -> Result<Box<dyn TableLoader>, sqlx::Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteLoader {
            tx,
            insert_sql: insert_sql("INSERT OR IGNORE INTO", table, columns, quote_sqlite),
        }))
    }

    async fn count_rows(&self, table: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_sqlite(table)))
            .fetch_one(&self.pool)
            .await
    }

    async fn ensure_version_table(&self) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                language_iso TEXT PRIMARY KEY,
                updated_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            super::VERSION_TABLE
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_language_version(&self, language: &str) -> Result<(), sqlx::Error> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(&format!(
            "INSERT INTO {} (language_iso, updated_at, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(language_iso) DO UPDATE SET updated_at = excluded.updated_at",
            super::VERSION_TABLE
        ))
        .bind(language)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn language_versions(&self) -> Result<Vec<LanguageVersion>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT language_iso, updated_at, created_at FROM {} ORDER BY language_iso",
            super::VERSION_TABLE
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in &rows {
            versions.push(LanguageVersion {
                language: row.try_get("language_iso")?,
                updated_at: row.try_get("updated_at")?,
                created_at: row.try_get("created_at")?,
            });
        }
        Ok(versions)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct SqliteLoader {
    tx: Transaction<'static, Sqlite>,
    insert_sql: String,
}

#[async_trait]
impl TableLoader for SqliteLoader {
    async fn insert_batch(&mut self, rows: &[Row]) -> Result<u64, sqlx::Error> {
        let mut inserted = 0;
        for row in rows {
            let mut query = sqlx::query(&self.insert_sql);
            for value in row.values() {
                query = bind_value(query, value);
            }
            let done = query.execute(&mut *self.tx).await.map_err(|e| {
                warn!(row = %describe_row(row), error = %e, "row rejected by warehouse");
                e
            })?;
            inserted += done.rows_affected();
        }
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        let this = *self;
        this.tx.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error> {
        let this = *self;
        this.tx.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::column_list;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn memory_warehouse() -> SqliteWarehouse {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteWarehouse::new(pool)
    }

    fn defs() -> Vec<ColumnDef> {
        vec![
            ColumnDef {
                name: "word".to_string(),
                data_type: "TEXT",
            },
            ColumnDef {
                name: "count".to_string(),
                data_type: "BIGINT",
            },
        ]
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("en_nouns", &defs());
        assert_eq!(
            sql,
            "CREATE TABLE \"en_nouns\" (\n    \"word\" TEXT,\n    \"count\" BIGINT\n)"
        );
        assert_eq!(
            column_list(&["word".to_string()], quote_sqlite),
            "\"word\""
        );
    }

    #[tokio::test]
    async fn test_table_lifecycle() {
        let wh = memory_warehouse().await;
        assert!(!wh.table_exists("en_nouns").await.unwrap());

        wh.create_table("en_nouns", &defs()).await.unwrap();
        assert!(wh.table_exists("en_nouns").await.unwrap());
        // Plain CREATE TABLE refuses to clobber.
        assert!(wh.create_table("en_nouns", &defs()).await.is_err());

        wh.rename_table("en_nouns", "en_nouns_old").await.unwrap();
        assert!(!wh.table_exists("en_nouns").await.unwrap());
        assert!(wh.table_exists("en_nouns_old").await.unwrap());

        wh.drop_table("en_nouns_old").await.unwrap();
        wh.drop_table("en_nouns_old").await.unwrap();
        assert!(!wh.table_exists("en_nouns_old").await.unwrap());
    }

    #[tokio::test]
    async fn test_loader_commit_and_rollback() {
        let wh = memory_warehouse().await;
        wh.create_table("en_nouns", &defs()).await.unwrap();
        let columns: Arc<[String]> = vec!["word".to_string(), "count".to_string()].into();
        let cols: Vec<String> = columns.to_vec();

        let rows = vec![
            Row::new(
                columns.clone(),
                vec![Value::Text("Haus".into()), Value::Integer(3)],
            ),
            Row::new(columns.clone(), vec![Value::Text("Baum".into()), Value::Null]),
        ];

        let mut loader = wh.begin_load("en_nouns", &cols).await.unwrap();
        assert_eq!(loader.insert_batch(&rows).await.unwrap(), 2);
        loader.rollback().await.unwrap();
        assert_eq!(wh.count_rows("en_nouns").await.unwrap(), 0);

        let mut loader = wh.begin_load("en_nouns", &cols).await.unwrap();
        loader.insert_batch(&rows).await.unwrap();
        loader.commit().await.unwrap();
        assert_eq!(wh.count_rows("en_nouns").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_version_upsert_keeps_created_at() {
        let wh = memory_warehouse().await;
        wh.ensure_version_table().await.unwrap();
        wh.ensure_version_table().await.unwrap();

        wh.record_language_version("en").await.unwrap();
        let first = wh.language_versions().await.unwrap();
        wh.record_language_version("en").await.unwrap();
        wh.record_language_version("de").await.unwrap();
        let second = wh.language_versions().await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].language, "de");
        assert_eq!(second[1].language, "en");
        assert_eq!(second[1].created_at, first[0].created_at);
        assert!(second[1].updated_at >= first[0].updated_at);
    }
}
