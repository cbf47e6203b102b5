use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn migrate_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pack-migrate");
    path
}

/// Write a snapshot with a `nouns` table of `rows` rows.
fn write_snapshot(path: &Path, rows: usize) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true),
            )
            .await
            .unwrap();
        sqlx::query("CREATE TABLE nouns (word TEXT, count INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(&format!(
            "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {}) \
             INSERT INTO nouns (word, count) SELECT 'word' || n, n FROM seq",
            rows
        ))
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    });
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let packs_dir = root.join("packs");
    fs::create_dir_all(&packs_dir).unwrap();
    write_snapshot(&packs_dir.join("TranslationData_en.sqlite"), 12);
    write_snapshot(&packs_dir.join("TranslationData_fr.sqlite"), 7);
    fs::write(packs_dir.join("README.txt"), "not a snapshot").unwrap();

    let config_content = format!(
        r#"[warehouse]
backend = "sqlite"
path = "{}/data/warehouse.sqlite"

[snapshots]
dir = "{}/packs"

[migration]
workers = 2
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("migrate.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_migrate(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = migrate_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(["--progress", "off"])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pack-migrate binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_version_table() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_migrate(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));

    let (_, _, again) = run_migrate(&config_path, &["init"]);
    assert!(again, "Second init failed (not idempotent)");
}

#[test]
fn test_run_migrates_and_reports() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_migrate(&config_path, &["run"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files: 2 (0 failed)"), "{}", stdout);
    assert!(stdout.contains("tables migrated: 2"));
    assert!(stdout.contains("rows copied: 19"));
    assert!(stdout.trim_end().ends_with("ok"));

    // Second run replaces rather than appends
    let (stdout, _, success) = run_migrate(&config_path, &["run"]);
    assert!(success);
    assert!(stdout.contains("rows copied: 19"));

    let (stdout, _, success) = run_migrate(&config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("Languages:   2"), "{}", stdout);
    assert!(stdout.contains("<1m"), "{}", stdout);
}

#[test]
fn test_run_single_language() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_migrate(&config_path, &["run", "--lang", "fr"]);
    assert!(success);
    assert!(stdout.contains("files: 1 (0 failed)"), "{}", stdout);
    assert!(stdout.contains("rows copied: 7"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_migrate(&config_path, &["run", "--dry-run"]);
    assert!(success, "dry-run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files found: 2"));
    assert!(stdout.contains("[en]"));
    assert!(stdout.contains("nouns"));
    assert!(!tmp.path().join("data/warehouse.sqlite").exists());
}

#[test]
fn test_bad_snapshot_name_does_not_fail_run() {
    let (tmp, config_path) = setup_test_env();
    write_snapshot(&tmp.path().join("packs/garbage.sqlite"), 1);

    let (stdout, stderr, success) = run_migrate(&config_path, &["run"]);
    assert!(success, "run failed: stderr={}", stderr);
    assert!(stdout.contains("files: 2 (1 failed)"), "{}", stdout);
    assert!(stderr.contains("garbage.sqlite"));
}

#[test]
fn test_missing_snapshot_dir_exits_nonzero() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_dir_all(tmp.path().join("packs")).unwrap();

    let (_, stderr, success) = run_migrate(&config_path, &["run"]);
    assert!(!success);
    assert!(stderr.contains("snapshot directory does not exist"), "{}", stderr);
}

#[test]
fn test_invalid_config_exits_nonzero() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("migrate.toml");
    fs::write(&config_path, "[warehouse]\nbackend = \"sqlite\"\n\n[snapshots]\ndir = \".\"\n").unwrap();

    let (_, stderr, success) = run_migrate(&config_path, &["run"]);
    assert!(!success);
    assert!(stderr.contains("warehouse.path"), "{}", stderr);
}
