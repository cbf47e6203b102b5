//! # Pack Migrate CLI (`pack-migrate`)
//!
//! Copies per-language SQLite snapshot packs into the shared warehouse.
//!
//! ## Usage
//!
//! ```bash
//! pack-migrate --config ./config/migrate.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pack-migrate init` | Create the warehouse database (if configured) and version table |
//! | `pack-migrate run` | Migrate every snapshot found in the snapshot directory |
//! | `pack-migrate run --dry-run` | List snapshots, tables and row counts without writing |
//! | `pack-migrate status` | Show when each language was last migrated |
//!
//! ## Examples
//!
//! ```bash
//! # Migrate only English and German, JSON progress on stderr
//! pack-migrate run --lang en --lang de --progress json
//!
//! # Verbose logging for one module
//! RUST_LOG=pack_migrate::transfer=debug pack-migrate run
//! ```
//!
//! Configuration, connection and discovery failures exit with status 1.
//! Failures scoped to one file or table are logged and the run exits 0.

mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use pack_migrate::config;
use pack_migrate::init::run_init;
use pack_migrate::progress::ProgressMode;
use pack_migrate::run::{run_migrate, RunOptions};
use pack_migrate::status::run_status;

/// Pack Migrate: replace warehouse tables with the contents of per-language
/// SQLite snapshots.
#[derive(Parser)]
#[command(
    name = "pack-migrate",
    about = "Migrate per-language SQLite snapshot packs into a shared warehouse",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/migrate.toml")]
    config: PathBuf,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Progress reporting on stderr.
    #[arg(long, global = true, value_enum, default_value_t = ProgressArg::Auto)]
    progress: ProgressArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    /// Human progress on a TTY, none otherwise.
    Auto,
    Human,
    Json,
    Off,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Prepare the warehouse.
    ///
    /// Creates the database when `warehouse.create_database` is set and the
    /// `language_data_versions` table. Safe to run repeatedly.
    Init,

    /// Migrate snapshots into the warehouse.
    ///
    /// Every table of every snapshot fully replaces its warehouse
    /// counterpart. The previous table is kept as `<table>_old` until the
    /// new one is committed and restored if anything fails.
    Run {
        /// Print discovered files, tables and row counts; write nothing.
        #[arg(long)]
        dry_run: bool,

        /// Only migrate these language codes (repeatable).
        #[arg(long = "lang", value_name = "CODE")]
        languages: Vec<String>,
    },

    /// Show migrated languages and when they were last updated.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            run_init(&cfg).await?;
        }
        Commands::Run { dry_run, languages } => {
            let options = RunOptions { dry_run, languages };
            run_migrate(&cfg, &options, cli.progress.mode().reporter()).await?;
        }
        Commands::Status => {
            run_status(&cfg).await?;
        }
    }

    Ok(())
}
