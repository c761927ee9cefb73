//! Remote module fetching.
//!
//! Registry-mirror fetches go through one shared HTTP client (bounded
//! timeout, identifying user agent) and a per-build memoization cache keyed
//! by resolved URL. The cache is owned by the caller and discarded with the
//! build; nothing survives an invocation.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deno_graph::ModuleSpecifier;
use log::{debug, info};
use reqwest::Client;

static SHIPKIT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Remote module fetches must not block indefinitely.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

lazy_static! {
    static ref REGISTRY_CLIENT: Client = reqwest::ClientBuilder::new()
        .user_agent(SHIPKIT_USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
        .expect("Failed to construct reqwest client");
}

/// Per-build module memoization arena, keyed by resolved URL.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: Mutex<HashMap<ModuleSpecifier, Arc<str>>>,
}

impl ModuleCache {
    pub fn get(&self, specifier: &ModuleSpecifier) -> Option<Arc<str>> {
        self.modules
            .lock()
            .expect("module cache lock poisoned")
            .get(specifier)
            .cloned()
    }

    pub fn insert(&self, specifier: ModuleSpecifier, text: Arc<str>) {
        self.modules
            .lock()
            .expect("module cache lock poisoned")
            .insert(specifier, text);
    }

    pub fn len(&self) -> usize {
        self.modules
            .lock()
            .expect("module cache lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetch a registry-mirror module, memoized for the duration of the build.
/// Non-2xx responses, network failures and empty bodies become located
/// errors naming the URL; they surface as bundle failures, not crashes.
pub async fn fetch_remote_module(
    specifier: &ModuleSpecifier,
    cache: &ModuleCache,
) -> Result<Arc<str>, io::Error> {
    if let Some(text) = cache.get(specifier) {
        debug!("Module cache hit for {}", specifier);
        return Ok(text);
    }

    info!("Fetching remote module {}", specifier);
    let response = REGISTRY_CLIENT
        .get(specifier.as_str())
        .send()
        .await
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to fetch module from {}: {}", specifier, e),
            )
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Registry mirror returned {} for {}", status, specifier),
        ));
    }

    let text = response.text().await.map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Failed to read module body from {}: {}", specifier, e),
        )
    })?;

    if text.trim().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Registry mirror returned an empty module for {}", specifier),
        ));
    }

    let text: Arc<str> = Arc::from(text);
    cache.insert(specifier.clone(), text.clone());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_is_keyed_by_resolved_url() {
        let cache = ModuleCache::default();
        let a = ModuleSpecifier::parse("https://cdn.jsdelivr.net/npm/a@1.0.0/+esm").unwrap();
        let b = ModuleSpecifier::parse("https://cdn.jsdelivr.net/npm/b@1.0.0/+esm").unwrap();

        cache.insert(a.clone(), Arc::from("export const a = 1;"));
        assert_eq!(cache.get(&a).as_deref(), Some("export const a = 1;"));
        assert!(cache.get(&b).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_module_is_served_without_network() {
        let cache = ModuleCache::default();
        // A URL no client could reach; the memoized entry must answer first.
        let url = ModuleSpecifier::parse("https://registry.invalid/npm/x@1.0.0/+esm").unwrap();
        cache.insert(url.clone(), Arc::from("export default 42;"));

        let text = fetch_remote_module(&url, &cache).await.unwrap();
        assert_eq!(&*text, "export default 42;");
    }
}
