use globset::{Glob, GlobSet, GlobSetBuilder};
use pack_migrate_core::models::SourceFile;
use walkdir::WalkDir;

use crate::config::SnapshotConfig;
use crate::error::{MigrateError, Result};

/// Snapshot files found in the configured directory.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Files with a recognised name, sorted by path.
    pub files: Vec<SourceFile>,
    /// Matching files whose names could not be parsed.
    pub rejected: Vec<MigrateError>,
}

/// Walk `config.dir` for snapshot files.
///
/// A missing directory or an unreadable entry is fatal. A file that matches
/// the include globs but not the naming convention is returned in
/// [`Discovery::rejected`] instead.
pub fn locate_snapshots(config: &SnapshotConfig) -> Result<Discovery> {
    let root = &config.dir;
    if !root.is_dir() {
        return Err(MigrateError::Discovery(format!(
            "snapshot directory does not exist: {}",
            root.display()
        )));
    }

    let include_set = build_globset(&config.include_globs)?;
    let naming = config.naming();

    let mut walker = WalkDir::new(root).min_depth(1);
    if !config.recursive {
        walker = walker.max_depth(1);
    }

    let mut paths = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| MigrateError::Discovery(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if !include_set.is_match(&rel_str) {
            continue;
        }
        paths.push(path.to_path_buf());
    }

    // Sort for deterministic ordering
    paths.sort();

    let mut discovery = Discovery::default();
    for path in paths {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match naming.language_code(&file_name) {
            Ok(language) => discovery.files.push(SourceFile { path, language }),
            Err(source) => discovery
                .rejected
                .push(MigrateError::FileName { path, source }),
        }
    }

    Ok(discovery)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .map_err(|e| MigrateError::Config(format!("invalid glob {}: {}", pattern, e)))?,
        );
    }
    builder
        .build()
        .map_err(|e| MigrateError::Config(format!("invalid include globs: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &std::path::Path, recursive: bool) -> SnapshotConfig {
        SnapshotConfig {
            dir: dir.to_path_buf(),
            include_globs: vec!["*.sqlite".to_string()],
            prefix: "TranslationData".to_string(),
            recursive,
        }
    }

    #[test]
    fn test_finds_sorted_and_rejects_bad_names() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "TranslationData_fr.sqlite",
            "de_LanguageData.sqlite",
            "TranslationData_en.sqlite",
            "notes.txt",
            "garbage.sqlite",
        ] {
            fs::write(tmp.path().join(name), b"").unwrap();
        }
        fs::create_dir(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("nested/TranslationData_sv.sqlite"), b"").unwrap();

        let found = locate_snapshots(&config(tmp.path(), false)).unwrap();
        let langs: Vec<&str> = found.files.iter().map(|f| f.language.as_str()).collect();
        assert_eq!(langs, vec!["en", "fr", "de"]);
        assert_eq!(found.rejected.len(), 1);
        assert!(found.rejected[0].to_string().contains("garbage.sqlite"));
        assert!(!found.rejected[0].is_fatal());

        let found = locate_snapshots(&config(tmp.path(), true)).unwrap();
        assert_eq!(found.files.len(), 4);
    }

    #[test]
    fn test_missing_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = locate_snapshots(&config(&tmp.path().join("nope"), false)).unwrap_err();
        assert!(err.is_fatal());
    }
}
