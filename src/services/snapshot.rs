//! Snapshot Inventory
//!
//! Measures a repository snapshot on disk: file count, total size and the
//! languages present. The walk honors `.gitignore` files.

use std::collections::BTreeMap;
use std::path::Path;

use review_cascade_tools::source::{language_of, snapshot_walker};
use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    pub file_count: u64,
    pub total_bytes: u64,
    /// Source files per detected language
    pub languages: BTreeMap<String, u64>,
}

impl SnapshotStats {
    /// Detected languages, most files first.
    pub fn ranked_languages(&self) -> Vec<String> {
        let mut ranked: Vec<(&String, &u64)> = self.languages.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        ranked.into_iter().map(|(l, _)| l.clone()).collect()
    }
}

pub fn measure_snapshot(root: &Path) -> AppResult<SnapshotStats> {
    if !root.is_dir() {
        return Err(AppError::validation(format!(
            "snapshot '{}' is not a directory",
            root.display()
        )));
    }

    let mut stats = SnapshotStats::default();
    for entry in snapshot_walker(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable snapshot entry");
                continue;
            }
        };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };

        stats.file_count += 1;
        stats.total_bytes += metadata.len();

        if let Some(language) = language_of(entry.path()) {
            *stats.languages.entry(language.to_string()).or_insert(0) += 1;
        }
    }

    tracing::debug!(
        root = %root.display(),
        files = stats.file_count,
        bytes = stats.total_bytes,
        "measured snapshot"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_measure_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/app.py"), "print('hi')\n").unwrap();
        fs::write(dir.path().join("src/util.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("src/web.ts"), "export {}\n").unwrap();
        fs::write(dir.path().join("README.md"), "# demo\n").unwrap();

        let stats = measure_snapshot(dir.path()).unwrap();
        assert_eq!(stats.file_count, 4);
        assert!(stats.total_bytes > 0);
        assert_eq!(stats.languages.get("python"), Some(&2));
        assert_eq!(stats.ranked_languages(), vec!["python", "typescript"]);
    }

    #[test]
    fn test_missing_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = measure_snapshot(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_gitignored_files_are_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "dist/\n").unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/bundle.js"), "var a;\n").unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();

        let stats = measure_snapshot(dir.path()).unwrap();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.ranked_languages(), vec!["go"]);
    }
}
