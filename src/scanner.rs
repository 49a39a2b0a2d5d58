use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::{IndexError, Result};
use crate::globs;
use crate::models::IndexSettings;

/// Maximum file size considered for indexing.
const MAX_FILE_SIZE_BYTES: u64 = 1_048_576; // 1 MB

/// A candidate file found by the scanner.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub path: PathBuf,
    /// Path relative to the codebase root, `/`-separated.
    pub relative_path: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unreadable,
    TooLarge,
    OverRunCap,
}

/// A file the scan could not keep, reported so run statistics never
/// silently drop it.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub relative_path: String,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<FileRef>,
    pub skipped: Vec<SkippedFile>,
}

/// Walk a codebase tree and collect candidate files.
///
/// Hidden entries and well-known dependency/build directories are always
/// skipped, then `excluded_patterns` drop files outright. If more than
/// `max_files_per_run` candidates remain, files matching the priority
/// patterns are kept first and the overflow is reported as skipped.
/// Unreadable entries are reported as skipped and the walk continues.
/// Each call rescans from scratch.
pub fn scan(
    root: &Path,
    settings: &IndexSettings,
    extra_priority: &[String],
) -> Result<ScanOutcome> {
    if !root.is_dir() {
        return Err(IndexError::Scan(format!(
            "codebase root {} is not a directory",
            root.display()
        )));
    }

    let excluded = globs::build(&settings.excluded_patterns)
        .map_err(|e| IndexError::Configuration(format!("invalid excluded pattern: {e}")))?;
    let mut priority_patterns = settings.priority_patterns.clone();
    priority_patterns.extend_from_slice(extra_priority);
    let priority = globs::build(&priority_patterns)
        .map_err(|e| IndexError::Configuration(format!("invalid priority pattern: {e}")))?;

    let mut outcome = ScanOutcome::default();

    // depth 0 is the root itself; its name must not disqualify the walk
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_or_ignored(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let rel = e
                    .path()
                    .map(|p| relative_to(p, root))
                    .unwrap_or_else(|| root.display().to_string());
                tracing::warn!("Failed to read {rel}: {e}");
                outcome.skipped.push(SkippedFile {
                    relative_path: rel,
                    reason: SkipReason::Unreadable,
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = relative_to(path, root);

        if excluded.is_match(&relative) {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Failed to stat {relative}: {e}");
                outcome.skipped.push(SkippedFile {
                    relative_path: relative,
                    reason: SkipReason::Unreadable,
                });
                continue;
            }
        };

        if meta.len() > MAX_FILE_SIZE_BYTES {
            outcome.skipped.push(SkippedFile {
                relative_path: relative,
                reason: SkipReason::TooLarge,
            });
            continue;
        }

        outcome.files.push(FileRef {
            path: path.to_path_buf(),
            language: detect_language(path),
            relative_path: relative,
            size: meta.len(),
            modified: meta.modified().ok(),
        });
    }

    // Enforce the per-run cap, priority-matching files first. The sort
    // is stable, so relative walk order is preserved within each group.
    if outcome.files.len() > settings.max_files_per_run {
        outcome
            .files
            .sort_by_key(|f| !priority.is_match(&f.relative_path));
        let overflow = outcome.files.split_off(settings.max_files_per_run);
        outcome.skipped.extend(overflow.into_iter().map(|f| SkippedFile {
            relative_path: f.relative_path,
            reason: SkipReason::OverRunCap,
        }));
    }

    Ok(outcome)
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn is_hidden_or_ignored(entry: &walkdir::DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') && name.len() > 1 {
        return true;
    }
    // Skip common non-code directories
    matches!(
        name.as_ref(),
        "node_modules"
            | "target"
            | "dist"
            | "build"
            | "__pycache__"
            | "vendor"
            | "venv"
            | "env"
            | "coverage"
    )
}

fn detect_language(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "tsx" => "tsx",
        "jsx" => "jsx",
        "go" => "go",
        "java" => "java",
        "c" => "c",
        "cpp" | "cc" | "h" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "r" => "r",
        "lua" => "lua",
        "sh" | "bash" | "zsh" | "fish" => "shell",
        "sql" => "sql",
        "html" => "html",
        "css" | "scss" | "less" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "md" | "rst" | "txt" => "text",
        "proto" => "protobuf",
        "ex" | "exs" => "elixir",
        "hs" => "haskell",
        "zig" => "zig",
        "dart" => "dart",
        "jl" => "julia",
        _ => "text",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn settings() -> IndexSettings {
        IndexSettings::new(Uuid::new_v4(), "nomic-embed-text")
    }

    #[test]
    fn test_scan_finds_files_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("README.md"), "# readme").unwrap();

        let outcome = scan(dir.path(), &settings(), &[]).unwrap();
        assert_eq!(outcome.files.len(), 2);
        assert!(outcome.skipped.is_empty());

        let main = outcome
            .files
            .iter()
            .find(|f| f.relative_path == "src/main.rs")
            .unwrap();
        assert_eq!(main.language, "rust");
        assert_eq!(main.size, 12);
        assert!(main.modified.is_some());
    }

    #[test]
    fn test_scan_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(scan(&missing, &settings(), &[]).is_err());
    }

    #[test]
    fn test_scan_applies_excluded_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("gen")).unwrap();
        std::fs::write(dir.path().join("gen/out.rs"), "x").unwrap();
        std::fs::write(dir.path().join("keep.rs"), "y").unwrap();

        let mut settings = settings();
        settings.excluded_patterns = vec!["gen/**".to_string()];
        let outcome = scan(dir.path(), &settings, &[]).unwrap();

        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].relative_path, "keep.rs");
    }

    #[test]
    fn test_scan_skips_hidden_and_dependency_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "x").unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg.js"), "x").unwrap();
        std::fs::write(dir.path().join("app.js"), "x").unwrap();

        let outcome = scan(dir.path(), &settings(), &[]).unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].relative_path, "app.js");
    }

    #[test]
    fn test_scan_reports_oversized_files_as_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("huge.txt"), "x".repeat(2 * 1024 * 1024)).unwrap();
        std::fs::write(dir.path().join("ok.txt"), "x").unwrap();

        let outcome = scan(dir.path(), &settings(), &[]).unwrap();
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].reason, SkipReason::TooLarge);
    }

    #[test]
    fn test_scan_cap_keeps_priority_files_and_reports_overflow() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..8 {
            std::fs::write(dir.path().join(format!("file_{i}.txt")), "x").unwrap();
        }
        std::fs::write(dir.path().join("important.rs"), "fn f() {}").unwrap();

        let mut settings = settings();
        settings.max_files_per_run = 3;
        settings.priority_patterns = vec!["*.rs".to_string()];
        let outcome = scan(dir.path(), &settings, &[]).unwrap();

        assert_eq!(outcome.files.len(), 3);
        assert!(outcome
            .files
            .iter()
            .any(|f| f.relative_path == "important.rs"));
        assert_eq!(outcome.skipped.len(), 6);
        assert!(outcome
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::OverRunCap));
    }

    #[test]
    fn test_scan_extra_priority_patterns_apply() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("a_{i}.txt")), "x").unwrap();
        }
        std::fs::write(dir.path().join("wanted.md"), "x").unwrap();

        let mut settings = settings();
        settings.max_files_per_run = 2;
        let outcome = scan(dir.path(), &settings, &["*.md".to_string()]).unwrap();

        assert!(outcome
            .files
            .iter()
            .any(|f| f.relative_path == "wanted.md"));
    }

    #[test]
    fn test_scan_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "x").unwrap();

        let first = scan(dir.path(), &settings(), &[]).unwrap();
        std::fs::write(dir.path().join("b.rs"), "y").unwrap();
        let second = scan(dir.path(), &settings(), &[]).unwrap();

        assert_eq!(first.files.len(), 1);
        assert_eq!(second.files.len(), 2);
    }
}
