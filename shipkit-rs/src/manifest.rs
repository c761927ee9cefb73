//! Deployment manifest accompanying the bundle.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MANIFEST_VERSION: u32 = 1;
pub const MODULE_FORMAT: &str = "esm";

/// Conservative default unless the caller overrides the flags.
pub const DEFAULT_COMPATIBILITY_FLAGS: &[&str] = &["nodejs_compat"];

/// Reference to a previously provisioned backing resource (a named
/// data-store handle, for example). `config` is opaque to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingDescriptor {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Metadata record telling the control plane how to run the bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManifest {
    pub version: u32,
    pub entrypoint: String,
    pub compatibility_flags: Vec<String>,
    pub module_format: String,
    pub built_at: String,
    pub bindings: BTreeMap<String, BindingDescriptor>,
}

/// Derive the manifest for one build. `bindings` is empty for brand-new
/// projects; existing projects contribute one entry per resource kind they
/// actually have.
pub fn build_manifest(
    entrypoint: &str,
    compatibility_flags: Option<Vec<String>>,
    bindings: &[BindingDescriptor],
) -> DeploymentManifest {
    let compatibility_flags = compatibility_flags.unwrap_or_else(|| {
        DEFAULT_COMPATIBILITY_FLAGS
            .iter()
            .map(|flag| flag.to_string())
            .collect()
    });

    let bindings = bindings
        .iter()
        .map(|binding| (binding.kind.clone(), binding.clone()))
        .collect();

    DeploymentManifest {
        version: MANIFEST_VERSION,
        entrypoint: entrypoint.to_string(),
        compatibility_flags,
        module_format: MODULE_FORMAT.to_string(),
        built_at: chrono::Utc::now().to_rfc3339(),
        bindings,
    }
}
