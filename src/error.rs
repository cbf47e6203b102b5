//! Error types for the migrator.
//!
//! [`MigrateError`] splits into two groups. Fatal errors (`Config`,
//! `Connection`, `Discovery`) stop the run before any table is touched.
//! Everything else is scoped to one file or one table: the dispatcher logs it
//! and carries on with sibling work.

use std::fmt;
use std::path::PathBuf;

use pack_migrate_core::naming::NamingError;
use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The warehouse could not be reached or prepared.
    #[error("cannot connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// The snapshot directory could not be enumerated.
    #[error("snapshot discovery failed: {0}")]
    Discovery(String),

    /// A snapshot file name did not follow the naming convention.
    #[error("skipping {}: {source}", path.display())]
    FileName {
        path: PathBuf,
        #[source]
        source: NamingError,
    },

    /// A snapshot file could not be opened or its tables listed.
    #[error("cannot read snapshot {}: {source}", path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    /// A snapshot table's columns could not be read.
    #[error("cannot read schema of {table}: {reason}")]
    SchemaRead { table: String, reason: String },

    /// The warehouse table name built for a snapshot table is unusable.
    #[error("cannot name warehouse table for {table}: {source}")]
    TableName {
        table: String,
        #[source]
        source: NamingError,
    },

    /// Existence check or backup rename failed; nothing was changed.
    #[error("cannot {action} {table}: {source}")]
    Warehouse {
        table: String,
        action: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// CREATE TABLE failed.
    #[error("failed to create table {table}: {source}{compensation}")]
    TableCreate {
        table: String,
        #[source]
        source: sqlx::Error,
        compensation: Compensation,
    },

    /// Row transfer failed and the transaction was rolled back.
    #[error("{source}{compensation}")]
    DataTransfer {
        #[source]
        source: TransferError,
        compensation: Compensation,
    },
}

impl MigrateError {
    /// Create a SchemaRead error.
    pub fn schema_read(table: impl Into<String>, reason: impl fmt::Display) -> Self {
        MigrateError::SchemaRead {
            table: table.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrateError::Config(_) | MigrateError::Connection { .. } | MigrateError::Discovery(_)
        )
    }

    /// Compensation outcome, for errors raised after the warehouse was touched.
    pub fn compensation(&self) -> Option<&Compensation> {
        match self {
            MigrateError::TableCreate { compensation, .. }
            | MigrateError::DataTransfer { compensation, .. } => Some(compensation),
            _ => None,
        }
    }
}

/// Batch transfer failure for one table; the transaction was rolled back.
#[derive(Error, Debug)]
#[error("data transfer into {table} failed: {source}")]
pub struct TransferError {
    pub table: String,
    #[source]
    pub source: sqlx::Error,
}

/// The backup could not be renamed back after a failed migration.
///
/// The pre-migration data now only exists under `backup`.
#[derive(Error, Debug)]
#[error("failed to restore {backup} to {table}: {source}")]
pub struct RestoreError {
    pub table: String,
    pub backup: String,
    #[source]
    pub source: sqlx::Error,
}

/// What the orchestrator did to undo a failed table migration.
#[derive(Debug)]
pub enum Compensation {
    /// No prior table and nothing left behind.
    NothingToRestore,
    /// The prior table was renamed back from its backup.
    Restored { backup: String },
    /// The prior table could not be renamed back.
    RestoreFailed(RestoreError),
}

impl Compensation {
    pub fn is_restore_failure(&self) -> bool {
        matches!(self, Compensation::RestoreFailed(_))
    }
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::NothingToRestore => Ok(()),
            Compensation::Restored { backup } => {
                write!(f, "; original table restored from {}", backup)
            }
            Compensation::RestoreFailed(err) => write!(f, "; RESTORE FAILED: {}", err),
        }
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn injected(msg: &str) -> sqlx::Error {
        sqlx::Error::Protocol(msg.to_string())
    }

    #[test]
    fn test_fatal_classification() {
        assert!(MigrateError::Config("x".into()).is_fatal());
        assert!(MigrateError::Discovery("x".into()).is_fatal());
        assert!(!MigrateError::schema_read("nouns", "no such table").is_fatal());
    }

    #[test]
    fn test_transfer_error_names_restore() {
        let err = MigrateError::DataTransfer {
            source: TransferError {
                table: "en_nouns".into(),
                source: injected("batch 2 exploded"),
            },
            compensation: Compensation::Restored {
                backup: "en_nouns_old".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("en_nouns"));
        assert!(msg.contains("batch 2 exploded"));
        assert!(msg.contains("restored from en_nouns_old"));
    }

    #[test]
    fn test_restore_failure_names_both_causes() {
        let err = MigrateError::TableCreate {
            table: "en_nouns".into(),
            source: injected("create refused"),
            compensation: Compensation::RestoreFailed(RestoreError {
                table: "en_nouns".into(),
                backup: "en_nouns_old".into(),
                source: injected("rename refused"),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("create refused"));
        assert!(msg.contains("RESTORE FAILED"));
        assert!(msg.contains("rename refused"));
        assert!(err.compensation().unwrap().is_restore_failure());
    }

    #[test]
    fn test_plain_create_error() {
        let err = MigrateError::TableCreate {
            table: "en_nouns".into(),
            source: injected("create refused"),
            compensation: Compensation::NothingToRestore,
        };
        assert!(err.to_string().ends_with("create refused"));
    }
}
