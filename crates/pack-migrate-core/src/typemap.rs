//! SQLite to warehouse column type mapping.
//!
//! Snapshot tables declare SQLite affinities; the warehouse gets a small,
//! fixed vocabulary. The mapping is total: anything unrecognised lands in
//! `TEXT`, which can hold every SQLite storage class.

/// Destination type for free text and anything unrecognised.
pub const TEXT: &str = "TEXT";
/// Destination type for SQLite `INTEGER`.
pub const BIGINT: &str = "BIGINT";
/// Destination type for SQLite `REAL`.
pub const DOUBLE: &str = "DOUBLE";
/// Destination type for SQLite `BLOB`.
pub const BLOB: &str = "BLOB";
/// Destination timestamp type.
pub const TIMESTAMP: &str = "TIMESTAMP";

/// Column that always carries a modification time, whatever its declared
/// type in the snapshot.
pub const LAST_MODIFIED_COLUMN: &str = "lastModified";

/// Map a declared SQLite type to its warehouse type, ignoring the column name.
pub fn sqlite_to_warehouse(sqlite_type: &str) -> &'static str {
    match sqlite_type.trim().to_uppercase().as_str() {
        "TEXT" => TEXT,
        "INTEGER" => BIGINT,
        "REAL" => DOUBLE,
        "BLOB" => BLOB,
        "DATETIME" | "TIMESTAMP" => TIMESTAMP,
        _ => TEXT,
    }
}

/// Map a column to its warehouse type.
///
/// The `lastModified` name override wins over the declared type.
pub fn map_column_type(sqlite_type: &str, column_name: &str) -> &'static str {
    if column_name.eq_ignore_ascii_case(LAST_MODIFIED_COLUMN) {
        return TIMESTAMP;
    }
    sqlite_to_warehouse(sqlite_type)
}
