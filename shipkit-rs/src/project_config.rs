//! Optional `package.json` inside the source store.
//!
//! Only three fields matter to the pipeline: `name` (project naming), `main`
//! (entry-point override) and `dependencies` (version pinning for remote
//! module fetches). Declared ranges are never validated against a lockfile.

use std::collections::BTreeMap;

use log::warn;
use serde::Deserialize;

use crate::error::DeployError;
use crate::source_store::SourceStore;

pub const CONFIG_FILE: &str = "package.json";

/// Floating version marker used when a dependency has no pinned version.
pub const LATEST_VERSION: &str = "latest";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub main: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Parse `package.json` from the store. Absence is fine (empty config);
    /// a present-but-malformed file is a caller error.
    pub fn from_store(store: &SourceStore) -> Result<ProjectConfig, DeployError> {
        let Some(text) = store.get(CONFIG_FILE) else {
            return Ok(ProjectConfig::default());
        };
        serde_json::from_str(text).map_err(|e| {
            DeployError::validation(format!("{} is not valid JSON: {}", CONFIG_FILE, e))
        })
    }

    /// Version to request from the registry mirror for `package`: the
    /// declared dependency with leading range operators stripped, or the
    /// floating `latest` marker when nothing is declared.
    ///
    /// The `latest` fallback makes builds done at different times
    /// non-deterministic, so callers surface a warning when it is taken.
    pub fn pinned_version(&self, package: &str) -> Option<String> {
        let range = self.dependencies.get(package)?;
        let version = strip_range_operators(range);
        if version.is_empty() || version == "*" || version == LATEST_VERSION {
            return None;
        }
        Some(version.to_string())
    }

    pub fn version_for(&self, package: &str) -> String {
        match self.pinned_version(package) {
            Some(version) => version,
            None => {
                warn!(
                    "No pinned version for package '{}'; falling back to '{}'",
                    package, LATEST_VERSION
                );
                LATEST_VERSION.to_string()
            }
        }
    }
}

/// Strip leading semver range operators (`^`, `~`, `>=`, `v`, ...) and keep
/// only the first version token of a compound range.
fn strip_range_operators(range: &str) -> &str {
    let stripped = range
        .trim()
        .trim_start_matches(['^', '~', '>', '<', '=', 'v', ' ']);
    stripped.split_whitespace().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn config_with(deps: &[(&str, &str)]) -> ProjectConfig {
        ProjectConfig {
            dependencies: deps
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case("^2.1.0", "2.1.0")]
    #[case("~1.0.3", "1.0.3")]
    #[case(">=4.2.0", "4.2.0")]
    #[case("v3.0.0", "3.0.0")]
    #[case("=1.2.3", "1.2.3")]
    #[case(">=1.2.3 <2.0.0", "1.2.3")]
    fn test_range_operators_are_stripped(#[case] range: &str, #[case] expected: &str) {
        let config = config_with(&[("pkg", range)]);
        assert_eq!(config.pinned_version("pkg").as_deref(), Some(expected));
    }

    #[test]
    fn test_undeclared_and_wildcard_float_to_latest() {
        let config = config_with(&[("any", "*")]);
        assert_eq!(config.pinned_version("any"), None);
        assert_eq!(config.pinned_version("missing"), None);
        assert_eq!(config.version_for("missing"), LATEST_VERSION);
    }

    #[test]
    fn test_missing_config_file_is_empty_config() {
        let store = SourceStore::from_files([("index.ts".to_string(), String::new())]);
        let config = ProjectConfig::from_store(&store).unwrap();
        assert!(config.dependencies.is_empty());
        assert!(config.main.is_none());
    }

    #[test]
    fn test_malformed_config_is_a_validation_error() {
        let store = SourceStore::from_files([(
            CONFIG_FILE.to_string(),
            "{ not json".to_string(),
        )]);
        let err = ProjectConfig::from_store(&store).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn test_parses_main_and_dependencies() {
        let store = SourceStore::from_files([(
            CONFIG_FILE.to_string(),
            r#"{"name": "demo", "main": "src/app.ts", "dependencies": {"left-pad": "^1.3.0"}}"#
                .to_string(),
        )]);
        let config = ProjectConfig::from_store(&store).unwrap();
        assert_eq!(config.name.as_deref(), Some("demo"));
        assert_eq!(config.main.as_deref(), Some("src/app.ts"));
        assert_eq!(config.pinned_version("left-pad").as_deref(), Some("1.3.0"));
    }
}
