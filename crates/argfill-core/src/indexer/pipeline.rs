//! Loading and parallel extraction of project sources with Rayon.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::indexer::filesystem::{iter_python_files, relative_path};
use crate::indexer::symbols::{extract_module, ParsedModule};

pub const DEFAULT_WORKERS: usize = 4;

/// A source file as (relative path, text).
pub type SourceText = (String, String);

/// Read every Python file under `root`. Unreadable files are skipped.
pub fn load_sources(root: &Path) -> Vec<SourceText> {
    iter_python_files(root)
        .into_iter()
        .filter_map(|path| {
            let rel = relative_path(root, &path);
            match std::fs::read_to_string(&path) {
                Ok(text) => Some((rel, text)),
                Err(e) => {
                    warn!("Failed to read {rel}: {e}");
                    None
                }
            }
        })
        .collect()
}

fn extract_worker((path, text): &SourceText) -> Option<ParsedModule> {
    match extract_module(path, text.clone()) {
        Ok(module) => Some(module),
        Err(e) => {
            warn!("Skipping {path}: {e}");
            None
        }
    }
}

/// Extract all sources, in parallel when a worker pool can be built.
/// Output order follows input order.
pub fn parallel_extract(sources: &[SourceText], workers: usize) -> Vec<ParsedModule> {
    if sources.is_empty() {
        return vec![];
    }
    let started = Instant::now();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    let modules: Vec<ParsedModule> = match pool {
        Ok(pool) => pool.install(|| sources.par_iter().filter_map(extract_worker).collect()),
        Err(e) => {
            debug!("Thread pool unavailable ({e}); extracting sequentially");
            sources.iter().filter_map(extract_worker).collect()
        }
    };

    info!(
        "Extracted {} of {} modules in {} ms",
        modules.len(),
        sources.len(),
        started.elapsed().as_millis()
    );
    modules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_extract_keeps_order() {
        let sources: Vec<SourceText> = (0..8)
            .map(|i| (format!("m{i}.py"), format!("def f{i}(x: int):\n    pass\n")))
            .collect();
        let modules = parallel_extract(&sources, 3);
        let names: Vec<_> = modules.iter().map(|m| m.module.clone()).collect();
        let expected: Vec<_> = (0..8).map(|i| format!("m{i}")).collect();
        assert_eq!(names, expected);
        assert_eq!(modules[5].functions[0].name, "f5");
    }

    #[test]
    fn test_empty_input() {
        assert!(parallel_extract(&[], DEFAULT_WORKERS).is_empty());
    }

    #[test]
    fn test_load_sources_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/models.py"), "class A:\n    pass\n").unwrap();
        let sources = load_sources(dir.path());
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].0, "app/models.py");
        assert!(sources[0].1.contains("class A"));
    }
}
