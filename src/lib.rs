//! # Pack Migrate
//!
//! Migrates per-language SQLite snapshot packs into a shared relational
//! warehouse (MariaDB, or a SQLite file for local use).
//!
//! Each snapshot file (`TranslationData_en.sqlite`, ...) holds one
//! language's tables. Every table is copied to a warehouse table named after
//! the language (`en_nouns` or `ENNouns`), fully replacing the previous
//! version without ever exposing a half-filled table.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Locator  │──▶│ Dispatcher │──▶│ Orchestrator │──▶│ Warehouse │
//! │ dir+glob │   │ N workers  │   │ backup/saga  │   │ MariaDB/  │
//! └──────────┘   └────────────┘   └──────┬───────┘   │ SQLite    │
//!                                        ▼           └─────▲─────┘
//!                                  ┌──────────┐            │
//!                                  │ Transfer │────────────┘
//!                                  │ 5000/tx  │
//!                                  └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Warehouse and snapshot connections |
//! | [`error`] | Error taxonomy and compensation outcomes |
//! | [`locator`] | Snapshot file discovery |
//! | [`snapshot`] | Snapshot schema introspection |
//! | [`transfer`] | Batched, transactional row copy |
//! | [`orchestrator`] | Per-table backup/create/transfer saga |
//! | [`pool`] | Bounded async worker pool |
//! | [`dispatch`] | One job per snapshot file |
//! | [`warehouse`] | Destination store abstraction and backends |
//! | [`progress`] | Progress reporting on stderr |
//! | [`run`], [`init`], [`status`] | CLI commands |

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod init;
pub mod locator;
pub mod orchestrator;
pub mod pool;
pub mod progress;
pub mod run;
pub mod snapshot;
pub mod status;
pub mod transfer;
pub mod warehouse;

pub use pack_migrate_core::models;
pub use pack_migrate_core::naming;
pub use pack_migrate_core::typemap;
