//! Data types shared by discovery, introspection, transfer and orchestration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::typemap::map_column_type;

/// A snapshot file found by the locator, with the language code parsed from
/// its file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: String,
}

/// Column layout of one snapshot table.
///
/// `column_names` and `column_types` are index-aligned and follow the
/// table's physical column order. The transfer engine maps row values by
/// position, so this order is never re-sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    column_names: Arc<[String]>,
    column_types: Vec<String>,
}

impl TableSchema {
    /// Build a schema from `(name, declared_type)` pairs in ordinal order.
    pub fn new(table: impl Into<String>, columns: Vec<(String, String)>) -> Self {
        let (names, types): (Vec<String>, Vec<String>) = columns.into_iter().unzip();
        Self {
            table: table.into(),
            column_names: names.into(),
            column_types: types,
        }
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Shared handle on the column names, used to label transferred rows.
    pub fn shared_column_names(&self) -> Arc<[String]> {
        Arc::clone(&self.column_names)
    }

    /// Declared SQLite types, as read from the snapshot.
    pub fn column_types(&self) -> &[String] {
        &self.column_types
    }

    pub fn len(&self) -> usize {
        self.column_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column_names.is_empty()
    }

    /// Warehouse column definitions, in source order, with types passed
    /// through the type mapper.
    pub fn destination_columns(&self) -> Vec<ColumnDef> {
        self.column_names
            .iter()
            .zip(&self.column_types)
            .map(|(name, declared)| ColumnDef {
                name: name.clone(),
                data_type: map_column_type(declared, name),
            })
            .collect()
    }
}

/// A warehouse column: name plus mapped type from [`crate::typemap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: &'static str,
}

/// One table's unit of work within a file job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationJob {
    pub language: String,
    pub source_table: String,
    pub destination_table: String,
}

impl MigrationJob {
    /// Name the pre-existing destination table is parked under while its
    /// replacement is built.
    pub fn backup_table(&self) -> String {
        backup_name(&self.destination_table)
    }
}

/// Backup name for a destination table.
pub fn backup_name(destination: &str) -> String {
    format!("{}_old", destination)
}

/// A dynamically typed cell value read from a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    /// The single coercion rule for raw byte payloads.
    ///
    /// SQLite hands back text stored with BLOB affinity as bytes. Payloads
    /// that are valid UTF-8 become [`Value::Text`]; anything else stays raw
    /// so binary data is never mangled.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Value::Text(text),
            Err(err) => Value::Bytes(err.into_bytes()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// One transferred row: values paired with the schema's column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Pair `values` with `columns`. Both must be in schema order.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// `(column, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nouns() -> TableSchema {
        TableSchema::new(
            "nouns",
            vec![
                ("word".to_string(), "TEXT".to_string()),
                ("count".to_string(), "INTEGER".to_string()),
                ("lastModified".to_string(), "TEXT".to_string()),
            ],
        )
    }

    #[test]
    fn test_schema_keeps_ordinal_order() {
        let schema = nouns();
        assert_eq!(schema.column_names(), ["word", "count", "lastModified"]);
        assert_eq!(schema.column_types(), ["TEXT", "INTEGER", "TEXT"]);
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_destination_columns_mapped() {
        let cols = nouns().destination_columns();
        let types: Vec<&str> = cols.iter().map(|c| c.data_type).collect();
        assert_eq!(types, ["TEXT", "BIGINT", "TIMESTAMP"]);
        assert_eq!(cols[1].name, "count");
    }

    #[test]
    fn test_bytes_coercion() {
        assert_eq!(
            Value::from_bytes(b"hello".to_vec()),
            Value::Text("hello".to_string())
        );
        assert_eq!(
            Value::from_bytes(vec![0xff, 0xfe, 0x00]),
            Value::Bytes(vec![0xff, 0xfe, 0x00])
        );
    }

    #[test]
    fn test_row_pairs() {
        let schema = nouns();
        let row = Row::new(
            schema.shared_column_names(),
            vec![
                Value::Text("Haus".to_string()),
                Value::Integer(3),
                Value::Null,
            ],
        );
        let pairs: Vec<(&str, &Value)> = row.iter().collect();
        assert_eq!(pairs[0], ("word", &Value::Text("Haus".to_string())));
        assert_eq!(pairs[1], ("count", &Value::Integer(3)));
        assert_eq!(pairs[2], ("lastModified", &Value::Null));
        assert_eq!(row.values().len(), 3);
    }

    #[test]
    fn test_backup_name() {
        let job = MigrationJob {
            language: "en".to_string(),
            source_table: "nouns".to_string(),
            destination_table: "en_nouns".to_string(),
        };
        assert_eq!(job.backup_table(), "en_nouns_old");
    }
}
