//! Filesystem scanning for Python sources.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::warn;

const IMPLICIT_IGNORED_DIRS: &[&str] = &[
    "__pycache__",
    "node_modules",
    "venv",
    "site-packages",
];

/// Every `.py` file under `root`, honouring `.gitignore` and skipping hidden
/// directories. Paths are sorted for stable project layouts.
pub fn iter_python_files(root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !IMPLICIT_IGNORED_DIRS.contains(&name.as_ref())
        })
        .build();

    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| is_python_file(path))
        .collect();
    files.sort();
    files
}

pub fn is_python_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("py"))
}

/// Forward-slash path of `path` relative to `root`.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
