//! Entry point detection.

use crate::error::DeployError;
use crate::project_config::ProjectConfig;
use crate::source_store::{normalize_path, SourceStore};

/// Extensions that mark a module as bundleable script source.
pub const SCRIPT_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs"];

/// Conventional entry filenames, probed in order: under `src/`, then at the
/// root, then the `worker` alias.
const ENTRY_CANDIDATES: &[&str] = &[
    "src/index.ts",
    "src/index.tsx",
    "src/index.js",
    "src/index.jsx",
    "src/index.mjs",
    "src/main.ts",
    "src/main.js",
    "index.ts",
    "index.tsx",
    "index.js",
    "index.jsx",
    "index.mjs",
    "main.ts",
    "main.js",
    "src/worker.ts",
    "src/worker.js",
    "worker.ts",
    "worker.js",
];

fn has_script_extension(path: &str) -> bool {
    SCRIPT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Pick the single module to start bundling from. First match wins:
/// a `main` declared in `package.json`, then the conventional candidate
/// list, then the first script module in the store's deterministic order.
pub fn resolve_entry_point(
    store: &SourceStore,
    config: &ProjectConfig,
) -> Result<String, DeployError> {
    if let Some(main) = &config.main {
        let main = normalize_path(main);
        if store.contains(&main) {
            return Ok(main);
        }
    }

    for candidate in ENTRY_CANDIDATES {
        if store.contains(candidate) {
            return Ok(candidate.to_string());
        }
    }

    if let Some(path) = store.paths().find(|path| has_script_extension(path)) {
        return Ok(path.to_string());
    }

    Err(DeployError::bundle_failed(
        "No entry point found: include an index/main/worker module or declare `main` in package.json",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(paths: &[&str]) -> SourceStore {
        SourceStore::from_files(paths.iter().map(|p| (p.to_string(), "export {};".to_string())))
    }

    #[test]
    fn test_declared_main_wins() {
        let store = store(&["src/index.ts", "src/app.ts"]);
        let config = ProjectConfig {
            main: Some("./src/app.ts".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_entry_point(&store, &config).unwrap(), "src/app.ts");
    }

    #[test]
    fn test_declared_main_missing_falls_through_to_candidates() {
        let store = store(&["src/index.ts"]);
        let config = ProjectConfig {
            main: Some("gone.ts".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_entry_point(&store, &config).unwrap(),
            "src/index.ts"
        );
    }

    #[test]
    fn test_src_candidates_beat_root_and_worker() {
        let store = store(&["worker.ts", "index.ts", "src/index.ts"]);
        let config = ProjectConfig::default();
        assert_eq!(
            resolve_entry_point(&store, &config).unwrap(),
            "src/index.ts"
        );
    }

    #[test]
    fn test_fallback_is_first_script_module() {
        let store = store(&["zz/app.ts", "aa/readme.md", "bb/helper.js"]);
        let config = ProjectConfig::default();
        assert_eq!(
            resolve_entry_point(&store, &config).unwrap(),
            "bb/helper.js"
        );
    }

    #[test]
    fn test_no_entry_point_is_an_error() {
        let store = store(&["readme.md", "data.json"]);
        let config = ProjectConfig::default();
        let err = resolve_entry_point(&store, &config).unwrap_err();
        assert!(err.to_string().contains("main"));
    }
}
