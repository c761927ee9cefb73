//! Module-graph bundling.
//!
//! Orchestrates entry-to-bundle compilation: the composed resolver and
//! loader feed deno_graph as it walks imports breadth-first, then the SWC
//! bundler flattens the resulting graph into one self-contained ES module.
//! Non-fatal observations (unpinned dependencies, builtin passthroughs,
//! recovered parse diagnostics) are collected as warnings and surfaced to
//! the caller alongside a successful bundle.

mod bundle_hook;
mod emit;
mod loader;
mod registry;
mod resolver;
mod text;

use std::sync::{Arc, Mutex};

use deno_graph::{BuildOptions, GraphKind, Module, ModuleGraph};
use log::{debug, info};

pub use loader::{DeployLoader, ModuleDialect};
pub use registry::{fetch_remote_module, ModuleCache, FETCH_TIMEOUT};
pub use resolver::{
    is_platform_builtin, namespace_of, registry_module_url, split_bare_specifier, store_url,
    DeployResolver, LocalResolver, Namespace, RemoteResolver, PLATFORM_BUILTIN_PREFIXES,
    PROBE_EXTENSIONS, REGISTRY_URL,
};

use crate::error::DeployError;
use crate::project_config::ProjectConfig;
use crate::source_store::SourceStore;

/// Shared collector for non-fatal bundling observations. Deduplicates on
/// push so repeated resolutions of the same package warn once.
#[derive(Debug, Clone, Default)]
pub struct WarningSink {
    entries: Arc<Mutex<Vec<String>>>,
}

impl WarningSink {
    pub fn push(&self, warning: String) {
        let mut entries = self.entries.lock().expect("warning sink lock poisoned");
        if !entries.contains(&warning) {
            entries.push(warning);
        }
    }

    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock().expect("warning sink lock poisoned"))
    }
}

/// One self-contained bundle, produced once per build.
#[derive(Debug, Clone)]
pub struct BundleArtifact {
    pub code: String,
    pub entrypoint: String,
    pub warnings: Vec<String>,
}

/// Resolve and bundle the module graph rooted at `entrypoint`.
///
/// `cache` is the per-build remote-module arena: the caller owns it and
/// discards it when the build ends, so no resolver state outlives an
/// invocation.
pub async fn bundle(
    store: Arc<SourceStore>,
    config: Arc<ProjectConfig>,
    entrypoint: &str,
    cache: Arc<ModuleCache>,
) -> Result<BundleArtifact, DeployError> {
    info!("Bundling module graph from '{}'", entrypoint);

    let warnings = WarningSink::default();
    let resolver = DeployResolver::new(
        LocalResolver::new(store.clone()),
        RemoteResolver::new(config, warnings.clone()),
    );
    let loader = DeployLoader::new(store, cache, warnings.clone());

    let root = store_url(entrypoint)
        .map_err(|e| DeployError::bundle_failed(format!("Invalid entry point: {}", e)))?;

    let mut graph = ModuleGraph::new(GraphKind::CodeOnly);
    graph
        .build(
            vec![root],
            vec![],
            &loader,
            BuildOptions {
                resolver: Some(resolver.as_resolver()),
                ..Default::default()
            },
        )
        .await;

    graph
        .valid()
        .map_err(|e| DeployError::bundle_failed(format!("Module resolution failed: {}", e)))?;
    debug!("Module graph has {} modules", graph.modules().count());

    for module in graph.modules() {
        if let Module::External(_) | Module::Node(_) | Module::Npm(_) = module {
            warnings.push(format!(
                "Leaving '{}' as an external import (platform builtin)",
                module.specifier()
            ));
        }
    }

    let code = emit::bundle_graph(&graph, &warnings)
        .map_err(|e| DeployError::bundle_failed(format!("Bundling failed: {:#}", e)))?;

    Ok(BundleArtifact {
        code,
        entrypoint: entrypoint.to_string(),
        warnings: warnings.drain(),
    })
}
