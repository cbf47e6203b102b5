//! MariaDB / MySQL warehouse backend.

use async_trait::async_trait;
use pack_migrate_core::models::{ColumnDef, Row, Value};
use pack_migrate_core::typemap::TIMESTAMP;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool};
use sqlx::query::Query;
use sqlx::{Row as _, Transaction};
use tracing::warn;

use super::{describe_row, insert_sql, quote_mysql, LanguageVersion, TableLoader, Warehouse};

const TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

/// [`Warehouse`] over a [`MySqlPool`] scoped to one database.
pub struct MariaDbWarehouse {
    pool: MySqlPool,
}

impl MariaDbWarehouse {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// `CREATE TABLE` for MariaDB. Timestamp columns are declared `NULL` so the
/// server neither auto-updates them nor rejects missing values.
fn create_table_sql(table: &str, columns: &[ColumnDef]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| {
            if c.data_type == TIMESTAMP {
                format!("{} {} NULL DEFAULT NULL", quote_mysql(&c.name), c.data_type)
            } else {
                format!("{} {}", quote_mysql(&c.name), c.data_type)
            }
        })
        .collect();
    format!(
        "CREATE TABLE {} (\n    {}\n) {}",
        quote_mysql(table),
        defs.join(",\n    "),
        TABLE_OPTIONS
    )
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Integer(v) => query.bind(*v),
        Value::Real(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
    }
}

#[async_trait]
impl Warehouse for MariaDbWarehouse {
    fn backend(&self) -> &'static str {
        "mariadb"
    }

    async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn drop_table(&self, table: &str) -> Result<(), sqlx::Error> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_mysql(table)))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rename_table(&self, from: &str, to: &str) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "RENAME TABLE {} TO {}",
            quote_mysql(from),
            quote_mysql(to)
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
        Ok(Box::new(MariaDbLoader {
            tx,
            insert_sql: insert_sql("INSERT IGNORE INTO", table, columns, quote_mysql),
        }))
    }

    async fn count_rows(&self, table: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_mysql(table)))
            .fetch_one(&self.pool)
            .await
    }

    async fn ensure_version_table(&self) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                language_iso VARCHAR(16) PRIMARY KEY,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            ) {}
            "#,
            super::VERSION_TABLE,
            TABLE_OPTIONS
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_language_version(&self, language: &str) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "INSERT INTO {} (language_iso, updated_at) VALUES (?, NOW()) ON DUPLICATE KEY UPDATE updated_at = NOW()",
            super::VERSION_TABLE
        ))
        .bind(language)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn language_versions(&self) -> Result<Vec<LanguageVersion>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT language_iso,
                   CAST(COALESCE(UNIX_TIMESTAMP(updated_at), 0) AS SIGNED) AS updated_at,
                   CAST(COALESCE(UNIX_TIMESTAMP(created_at), 0) AS SIGNED) AS created_at
            FROM {}
            ORDER BY language_iso
            "#,
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

struct MariaDbLoader {
    tx: Transaction<'static, MySql>,
    insert_sql: String,
}

#[async_trait]
impl TableLoader for MariaDbLoader {
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

    #[test]
    fn test_create_table_sql() {
        let cols = vec![
            ColumnDef {
                name: "word".to_string(),
                data_type: "TEXT",
            },
            ColumnDef {
                name: "lastModified".to_string(),
                data_type: "TIMESTAMP",
            },
        ];
        let sql = create_table_sql("en_nouns", &cols);
        assert!(sql.starts_with("CREATE TABLE `en_nouns` ("));
        assert!(sql.contains("`word` TEXT,"));
        assert!(sql.contains("`lastModified` TIMESTAMP NULL DEFAULT NULL"));
        assert!(sql.ends_with(TABLE_OPTIONS));
        assert!(!sql.contains("IF NOT EXISTS"));
    }

    #[test]
    fn test_column_list() {
        let cols = vec!["a".to_string(), "b`c".to_string()];
        assert_eq!(column_list(&cols, quote_mysql), "`a`, `b``c`");
    }
}
