use globset::Glob;
use pack_migrate_core::naming::{SnapshotNaming, TableStyle};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub warehouse: WarehouseConfig,
    pub snapshots: SnapshotConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    #[serde(alias = "mysql")]
    Mariadb,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Warehouse file for the `sqlite` backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub create_database: bool,
}

fn default_port() -> u16 {
    3306
}
fn default_max_connections() -> u32 {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub recursive: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["*.sqlite".to_string()]
}
fn default_prefix() -> String {
    "TranslationData".to_string()
}

impl SnapshotConfig {
    pub fn naming(&self) -> SnapshotNaming {
        SnapshotNaming::new(self.prefix.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MigrationConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub table_style: TableStyle,
    #[serde(default = "default_track_versions")]
    pub track_versions: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            table_style: TableStyle::Snake,
            track_versions: true,
        }
    }
}

fn default_workers() -> usize {
    4
}
fn default_track_versions() -> bool {
    true
}

/// Connection parameters for the MariaDB backend, all present.
#[derive(Clone)]
pub struct MariaDbParams<'a> {
    pub host: &'a str,
    pub port: u16,
    pub user: &'a str,
    pub password: &'a str,
    pub name: &'a str,
}

impl WarehouseConfig {
    /// MariaDB parameters; errors name the first missing field.
    pub fn mariadb_params(&self) -> Result<MariaDbParams<'_>> {
        Ok(MariaDbParams {
            host: required(&self.host, "warehouse.host")?,
            port: self.port,
            user: required(&self.user, "warehouse.user")?,
            password: required(&self.password, "warehouse.password")?,
            name: required(&self.name, "warehouse.name")?,
        })
    }

    pub fn sqlite_path(&self) -> Result<&Path> {
        self.path.as_deref().ok_or_else(|| {
            MigrateError::Config("warehouse.path is required for the sqlite backend".to_string())
        })
    }

    /// Human-readable target for logs and connection errors. Never includes
    /// the password.
    pub fn describe(&self) -> String {
        match self.backend {
            Backend::Mariadb => format!(
                "mariadb://{}@{}:{}/{}",
                self.user.as_deref().unwrap_or("?"),
                self.host.as_deref().unwrap_or("?"),
                self.port,
                self.name.as_deref().unwrap_or("?")
            ),
            Backend::Sqlite => format!(
                "sqlite:{}",
                self.path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "?".to_string())
            ),
        }
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) => Ok(v),
        None => Err(MigrateError::Config(format!("{} is required", field))),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MigrateError::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| MigrateError::Config(format!("failed to parse config file: {}", e)))?;

    // Validate warehouse
    match config.warehouse.backend {
        Backend::Mariadb => {
            config.warehouse.mariadb_params()?;
        }
        Backend::Sqlite => {
            config.warehouse.sqlite_path()?;
        }
    }
    if config.warehouse.max_connections == 0 {
        return Err(MigrateError::Config(
            "warehouse.max_connections must be >= 1".to_string(),
        ));
    }

    // Validate snapshots
    if config.snapshots.prefix.is_empty() {
        return Err(MigrateError::Config(
            "snapshots.prefix must not be empty".to_string(),
        ));
    }
    if config.snapshots.include_globs.is_empty() {
        return Err(MigrateError::Config(
            "snapshots.include_globs must list at least one pattern".to_string(),
        ));
    }
    for pattern in &config.snapshots.include_globs {
        Glob::new(pattern).map_err(|e| {
            MigrateError::Config(format!("invalid snapshots.include_globs entry: {}", e))
        })?;
    }

    // Validate migration
    if config.migration.workers == 0 {
        return Err(MigrateError::Config(
            "migration.workers must be >= 1".to_string(),
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARIADB: &str = r#"
[warehouse]
host = "127.0.0.1"
user = "scribe"
password = "secret"
name = "scribe"

[snapshots]
dir = "./packs/sqlite"
"#;

    #[test]
    fn test_defaults() {
        let cfg = parse_config(MARIADB).unwrap();
        assert_eq!(cfg.warehouse.backend, Backend::Mariadb);
        assert_eq!(cfg.warehouse.port, 3306);
        assert_eq!(cfg.warehouse.max_connections, 8);
        assert!(!cfg.warehouse.create_database);
        assert_eq!(cfg.snapshots.include_globs, vec!["*.sqlite"]);
        assert_eq!(cfg.snapshots.prefix, "TranslationData");
        assert!(!cfg.snapshots.recursive);
        assert_eq!(cfg.migration.workers, 4);
        assert_eq!(cfg.migration.table_style, TableStyle::Snake);
        assert!(cfg.migration.track_versions);
    }

    #[test]
    fn test_missing_mariadb_field_is_fatal() {
        let text = MARIADB.replace("password = \"secret\"\n", "");
        let err = parse_config(&text).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("warehouse.password"));
    }

    #[test]
    fn test_sqlite_backend_requires_path() {
        let text = r#"
[warehouse]
backend = "sqlite"

[snapshots]
dir = "./packs"
"#;
        let err = parse_config(text).unwrap_err();
        assert!(err.to_string().contains("warehouse.path"));

        let ok = text.replace("backend = \"sqlite\"", "backend = \"sqlite\"\npath = \"w.sqlite\"");
        let cfg = parse_config(&ok).unwrap();
        assert_eq!(cfg.warehouse.describe(), "sqlite:w.sqlite");
    }

    #[test]
    fn test_rejects_zero_workers_and_bad_globs() {
        let text = format!("{}\n[migration]\nworkers = 0\n", MARIADB);
        assert!(parse_config(&text).is_err());

        let text = MARIADB.replace(
            "dir = \"./packs/sqlite\"",
            "dir = \"./packs/sqlite\"\ninclude_globs = [\"[\"]",
        );
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn test_pascal_style_and_describe() {
        let text = format!("{}\n[migration]\ntable_style = \"pascal\"\n", MARIADB);
        let cfg = parse_config(&text).unwrap();
        assert_eq!(cfg.migration.table_style, TableStyle::Pascal);
        assert_eq!(
            cfg.warehouse.describe(),
            "mariadb://scribe@127.0.0.1:3306/scribe"
        );
    }

    #[test]
    fn test_example_config_parses() {
        let cfg = parse_config(include_str!("../config/migrate.example.toml")).unwrap();
        assert_eq!(cfg.snapshots.dir, PathBuf::from("./packs/sqlite"));
        assert_eq!(cfg.migration.workers, 4);
    }

    #[test]
    fn test_unparseable_config() {
        let err = parse_config("[warehouse\n").unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }
}
