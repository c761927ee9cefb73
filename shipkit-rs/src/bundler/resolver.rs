//! Specifier resolution.
//!
//! Two concrete resolvers cover the two namespaces a module's bytes can
//! come from: [`LocalResolver`] probes the in-memory source store for
//! relative imports, [`RemoteResolver`] turns bare package specifiers into
//! registry-mirror URLs pinned by the project's declared dependencies.
//! [`DeployResolver`] composes the two behind deno_graph's resolution hook.
//!
//! The namespace of a resolved specifier is encoded in its URL scheme:
//! `file:` for store modules, `http(s):` for registry modules, anything
//! else (a platform builtin such as `node:buffer`) passes through
//! unbundled.

use std::sync::Arc;

use deno_error::JsErrorBox;
use deno_graph::source::{ResolutionKind, ResolveError, Resolver};
use deno_graph::{ModuleSpecifier, Range};
use log::debug;

use super::WarningSink;
use crate::project_config::ProjectConfig;
use crate::source_store::SourceStore;

/// Registry mirror serving published packages as fetchable module URLs.
pub const REGISTRY_URL: &str = "https://cdn.jsdelivr.net";

/// Specifier prefixes provided by the deployment runtime itself; these are
/// left as external imports, neither bundled nor fetched.
pub const PLATFORM_BUILTIN_PREFIXES: &[&str] = &["node:", "cloudflare:"];

/// Extensions appended when probing an extensionless relative import, in
/// priority order. The same list is used for `<dir>/index` probing.
pub const PROBE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".json"];

/// Where a resolved module's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Local,
    Remote,
    Builtin,
}

pub fn namespace_of(specifier: &ModuleSpecifier) -> Namespace {
    match specifier.scheme() {
        "file" => Namespace::Local,
        "http" | "https" => Namespace::Remote,
        _ => Namespace::Builtin,
    }
}

pub fn is_platform_builtin(specifier: &str) -> bool {
    PLATFORM_BUILTIN_PREFIXES
        .iter()
        .any(|prefix| specifier.starts_with(prefix))
}

/// `file:` URL for a store path.
pub fn store_url(path: &str) -> Result<ModuleSpecifier, ResolveError> {
    ModuleSpecifier::parse(&format!("file:///{}", path)).map_err(|e| {
        ResolveError::Other(JsErrorBox::generic(format!(
            "Invalid store path '{}': {}",
            path, e
        )))
    })
}

/// Store path for a `file:` URL.
pub fn store_path_of(specifier: &ModuleSpecifier) -> String {
    let path = specifier.path();
    let decoded = urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_string());
    decoded.trim_start_matches('/').to_string()
}

/// Resolves relative and root-absolute specifiers against the source store.
pub struct LocalResolver {
    store: Arc<SourceStore>,
}

impl LocalResolver {
    pub fn new(store: Arc<SourceStore>) -> Self {
        LocalResolver { store }
    }

    /// Normalize `specifier` against the importing module's directory, then
    /// probe: exact path, each extension appended, then `<path>/index` with
    /// each extension. First hit wins.
    pub fn resolve(
        &self,
        specifier: &str,
        referrer: &ModuleSpecifier,
    ) -> Result<ModuleSpecifier, ResolveError> {
        let joined = deno_graph::resolve_import(specifier, referrer).map_err(ResolveError::from)?;
        let requested = store_path_of(&joined);

        match self.probe(&requested) {
            Some(hit) => {
                debug!("Resolved '{}' from {} -> {}", specifier, referrer, hit);
                store_url(&hit)
            }
            None => Err(ResolveError::Other(JsErrorBox::generic(format!(
                "Module not found: cannot resolve '{}' imported from '{}'",
                specifier,
                store_path_of(referrer)
            )))),
        }
    }

    fn probe(&self, path: &str) -> Option<String> {
        if self.store.contains(path) {
            return Some(path.to_string());
        }
        for ext in PROBE_EXTENSIONS {
            let candidate = format!("{}{}", path, ext);
            if self.store.contains(&candidate) {
                return Some(candidate);
            }
        }
        for ext in PROBE_EXTENSIONS {
            let candidate = format!("{}/index{}", path, ext);
            if self.store.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Resolves bare package specifiers to registry-mirror URLs.
pub struct RemoteResolver {
    config: Arc<ProjectConfig>,
    warnings: WarningSink,
}

impl RemoteResolver {
    pub fn new(config: Arc<ProjectConfig>, warnings: WarningSink) -> Self {
        RemoteResolver { config, warnings }
    }

    /// Resolve a bare specifier: split off the package name (two segments
    /// for scoped packages), pin the version from the dependency
    /// declarations, and build the ES-module registry URL.
    pub fn resolve_bare(&self, specifier: &str) -> Result<ModuleSpecifier, ResolveError> {
        let (name, subpath) = split_bare_specifier(specifier).ok_or_else(|| {
            ResolveError::Other(JsErrorBox::generic(format!(
                "Invalid package specifier '{}'",
                specifier
            )))
        })?;

        if self.config.pinned_version(&name).is_none() {
            self.warnings.push(format!(
                "Package '{}' has no pinned version in package.json; using 'latest', which may differ between builds",
                name
            ));
        }
        let version = self.config.version_for(&name);

        let url = registry_module_url(&name, &version, subpath.as_deref());
        ModuleSpecifier::parse(&url).map_err(|e| {
            ResolveError::Other(JsErrorBox::generic(format!(
                "Could not build registry URL for '{}': {}",
                specifier, e
            )))
        })
    }
}

/// Split a bare specifier into package name and optional subpath. The name
/// is the first segment, or the first two joined when the specifier is
/// scoped (`@scope/pkg/sub` → `@scope/pkg` + `sub`).
pub fn split_bare_specifier(specifier: &str) -> Option<(String, Option<String>)> {
    let specifier = specifier.trim();
    if let Some(rest) = specifier.strip_prefix('@') {
        let mut parts = rest.splitn(3, '/');
        let scope = parts.next()?;
        let name = parts.next()?;
        if scope.is_empty() || name.is_empty() {
            return None;
        }
        let subpath = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        Some((format!("@{}/{}", scope, name), subpath))
    } else {
        let mut parts = specifier.splitn(2, '/');
        let name = parts.next()?;
        if name.is_empty() {
            return None;
        }
        let subpath = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        Some((name.to_string(), subpath))
    }
}

/// Registry-mirror URL for a package module, requesting the ES-module
/// variant.
pub fn registry_module_url(name: &str, version: &str, subpath: Option<&str>) -> String {
    match subpath {
        Some(subpath) => format!(
            "{}/npm/{}@{}/{}/+esm",
            REGISTRY_URL, name, version, subpath
        ),
        None => format!("{}/npm/{}@{}/+esm", REGISTRY_URL, name, version),
    }
}

/// Composite resolution hook handed to the module-graph builder.
pub struct DeployResolver {
    local: LocalResolver,
    remote: RemoteResolver,
}

impl std::fmt::Debug for DeployResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployResolver").finish_non_exhaustive()
    }
}

impl DeployResolver {
    pub fn new(local: LocalResolver, remote: RemoteResolver) -> Self {
        DeployResolver { local, remote }
    }

    pub fn as_resolver(&self) -> &dyn Resolver {
        self
    }

    pub fn resolve_specifier(
        &self,
        specifier: &str,
        referrer: &ModuleSpecifier,
    ) -> Result<ModuleSpecifier, ResolveError> {
        if is_platform_builtin(specifier) {
            return ModuleSpecifier::parse(specifier).map_err(|e| {
                ResolveError::Other(JsErrorBox::generic(format!(
                    "Invalid builtin specifier '{}': {}",
                    specifier, e
                )))
            });
        }

        match namespace_of(referrer) {
            // Inside a fetched module, relative and host-absolute paths stay
            // on the registry mirror; anything else is another package.
            Namespace::Remote => {
                if specifier.starts_with('.') || specifier.starts_with('/') {
                    deno_graph::resolve_import(specifier, referrer).map_err(ResolveError::from)
                } else {
                    self.remote.resolve_bare(specifier)
                }
            }
            _ => {
                if specifier.starts_with('.') || specifier.starts_with('/') {
                    self.local.resolve(specifier, referrer)
                } else {
                    self.remote.resolve_bare(specifier)
                }
            }
        }
    }
}

impl Resolver for DeployResolver {
    fn resolve(
        &self,
        specifier: &str,
        referrer_range: &Range,
        _kind: ResolutionKind,
    ) -> Result<ModuleSpecifier, ResolveError> {
        self.resolve_specifier(specifier, &referrer_range.specifier)
    }
}
