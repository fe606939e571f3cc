//! Snapshot Source
//!
//! Gitignore-aware traversal of a repository snapshot, shared by the snapshot
//! inventory and by reasoning tools that quote source text in their prompts.

use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};

use ignore::{Walk, WalkBuilder};

/// Files larger than this are never quoted.
const MAX_QUOTED_FILE_BYTES: u64 = 256 * 1024;

/// Walk a snapshot in file-name order, honoring `.gitignore` and `.git/info/exclude`.
///
/// Hidden files are included (configuration such as `.env` matters to a
/// review); the `.git` directory is not.
pub fn snapshot_walker(root: &Path) -> Walk {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .follow_links(false)
        .git_ignore(true)
        .git_exclude(true)
        .git_global(false)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| entry.file_name() != ".git");
    builder.build()
}

/// Map a file extension to the language it is written in.
pub fn detect_language(ext: Option<&str>) -> Option<&'static str> {
    let language = match ext? {
        "py" => "python",
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "cs" => "c#",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "c++",
        "c" | "h" => "c",
        "php" => "php",
        "rb" => "ruby",
        "swift" => "swift",
        _ => return None,
    };
    Some(language)
}

/// Language of the file at `path`, judged by its extension.
pub fn language_of(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    detect_language(ext.as_deref())
}

/// Source text quoted from a snapshot, bounded by a character budget.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceExcerpt {
    /// `### path` headers followed by line-numbered file contents
    pub text: String,
    /// Files quoted, fully or partially
    pub files: usize,
    /// Whether the budget cut the excerpt short
    pub truncated: bool,
}

impl SourceExcerpt {
    pub fn is_empty(&self) -> bool {
        self.files == 0
    }
}

/// Quote the text files of a snapshot until `max_chars` is spent.
///
/// Source files in one of `languages` come first, then other source files,
/// then remaining text files; each group keeps walk order. Binary, non-UTF-8
/// and oversized files are skipped. A snapshot path that does not exist
/// yields an empty excerpt.
pub fn source_excerpt(root: &Path, languages: &[String], max_chars: usize) -> SourceExcerpt {
    let mut excerpt = SourceExcerpt::default();
    if max_chars == 0 || !root.exists() {
        return excerpt;
    }

    let mut candidates: Vec<(u8, PathBuf)> = Vec::new();
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
        if entry.metadata().map(|m| m.len() > MAX_QUOTED_FILE_BYTES).unwrap_or(true) {
            continue;
        }
        let rank = match language_of(entry.path()) {
            Some(lang) if languages.iter().any(|l| l.eq_ignore_ascii_case(lang)) => 2,
            Some(_) => 1,
            None => 0,
        };
        candidates.push((rank, entry.into_path()));
    }
    candidates.sort_by_key(|(rank, _)| Reverse(*rank));

    let mut remaining = max_chars;
    for (_, path) in candidates {
        let Ok(bytes) = fs::read(&path) else {
            continue;
        };
        if bytes.contains(&0) {
            continue;
        }
        let Ok(content) = String::from_utf8(bytes) else {
            continue;
        };

        let display = path.strip_prefix(root).unwrap_or(&path);
        let display = if display.as_os_str().is_empty() {
            path.file_name().map(Path::new).unwrap_or(&path)
        } else {
            display
        };
        let header = format!("### {}\n", display.display());
        let header_len = header.chars().count();
        if header_len >= remaining {
            excerpt.truncated = true;
            break;
        }
        excerpt.text.push_str(&header);
        remaining -= header_len;
        excerpt.files += 1;

        for (idx, line) in content.lines().enumerate() {
            let numbered = format!("{:>4} | {}\n", idx + 1, line);
            let len = numbered.chars().count();
            if len > remaining {
                excerpt.truncated = true;
                break;
            }
            excerpt.text.push_str(&numbered);
            remaining -= len;
        }
        if excerpt.truncated {
            break;
        }
    }

    tracing::debug!(
        root = %root.display(),
        files = excerpt.files,
        truncated = excerpt.truncated,
        "collected source excerpt"
    );
    excerpt
}
