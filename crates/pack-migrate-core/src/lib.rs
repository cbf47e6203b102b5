//! # pack-migrate core
//!
//! Runtime-agnostic pieces of the snapshot migrator: the data model that
//! flows between introspection, transfer and orchestration, the SQLite to
//! warehouse type mapper, and the file and table naming conventions.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Everything here is
//! pure and unit-testable without a database.

pub mod models;
pub mod naming;
pub mod typemap;
