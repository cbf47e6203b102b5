//! Migration progress reporting.
//!
//! Reports observable progress during `pack-migrate run` so users see which
//! snapshots are being processed and how many tables are left. Progress is
//! emitted on **stderr** so the stdout summary stays parseable for scripts.

use std::io::Write;
use std::path::PathBuf;

/// A single progress event for a migration run.
#[derive(Clone, Debug)]
pub enum MigrationProgressEvent {
    /// Scanning the snapshot directory (total unknown).
    Discovering { dir: PathBuf },
    /// A file job picked up a snapshot with this many tables.
    FileStarted { language: String, tables: u64 },
    /// A table finished; `n` of `total` tables in this file are done.
    TableFinished {
        language: String,
        table: String,
        rows: u64,
        ok: bool,
        n: u64,
        total: u64,
    },
}

/// Reports migration progress. Implementations write to stderr (human or JSON).
pub trait MigrationProgressReporter: Send + Sync {
    /// Emit a progress event. Called concurrently from file jobs.
    fn report(&self, event: MigrationProgressEvent);
}

/// Human-friendly progress on stderr: "migrate en  en_nouns  12,003 rows  (1 / 4 tables)".
pub struct StderrProgress;

impl MigrationProgressReporter for StderrProgress {
    fn report(&self, event: MigrationProgressEvent) {
        let line = match &event {
            MigrationProgressEvent::Discovering { dir } => {
                format!("migrate  discovering {}...\n", dir.display())
            }
            MigrationProgressEvent::FileStarted { language, tables } => {
                format!("migrate {}  {} tables\n", language, format_number(*tables))
            }
            MigrationProgressEvent::TableFinished {
                language,
                table,
                rows,
                ok,
                n,
                total,
            } => {
                let outcome = if *ok {
                    format!("{} rows", format_number(*rows))
                } else {
                    "FAILED".to_string()
                };
                format!(
                    "migrate {}  {}  {}  ({} / {} tables)\n",
                    language, table, outcome, n, total
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl MigrationProgressReporter for JsonProgress {
    fn report(&self, event: MigrationProgressEvent) {
        let obj = match &event {
            MigrationProgressEvent::Discovering { dir } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "dir": dir.display().to_string()
            }),
            MigrationProgressEvent::FileStarted { language, tables } => serde_json::json!({
                "event": "progress",
                "phase": "file_started",
                "language": language,
                "tables": tables
            }),
            MigrationProgressEvent::TableFinished {
                language,
                table,
                rows,
                ok,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "table_finished",
                "language": language,
                "table": table,
                "rows": rows,
                "ok": ok,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl MigrationProgressReporter for NoProgress {
    fn report(&self, _event: MigrationProgressEvent) {}
}

/// Row counts with thousands separators: `12003` → `12,003`.
pub(crate) fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode, shared by every file job.
    pub fn reporter(&self) -> std::sync::Arc<dyn MigrationProgressReporter> {
        match self {
            ProgressMode::Off => std::sync::Arc::new(NoProgress),
            ProgressMode::Human => std::sync::Arc::new(StderrProgress),
            ProgressMode::Json => std::sync::Arc::new(JsonProgress),
        }
    }
}
