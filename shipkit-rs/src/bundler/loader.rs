//! Module loading for the graph builder.
//!
//! Implements deno_graph's `Loader` trait over the two namespaces: `file:`
//! specifiers are served from the in-memory source store, `http(s):`
//! specifiers are fetched from the registry mirror through the per-build
//! cache, and anything else (platform builtins) is reported as external so
//! it survives bundling as a plain import.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use deno_graph::source::{LoadError, LoadFuture, LoadOptions, LoadResponse, Loader};
use deno_graph::ModuleSpecifier;

use super::registry::{fetch_remote_module, ModuleCache};
use super::resolver::store_path_of;
use super::WarningSink;
use crate::source_store::SourceStore;

/// Syntax-dialect hint supplied to the compiler toolchain alongside each
/// module's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleDialect {
    Script,
    TypedScript,
    Jsx,
    TypedJsx,
    Json,
}

impl ModuleDialect {
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".ts") || path.ends_with(".mts") {
            ModuleDialect::TypedScript
        } else if path.ends_with(".tsx") {
            ModuleDialect::TypedJsx
        } else if path.ends_with(".jsx") {
            ModuleDialect::Jsx
        } else if path.ends_with(".json") {
            ModuleDialect::Json
        } else {
            ModuleDialect::Script
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ModuleDialect::Script => "application/javascript",
            ModuleDialect::TypedScript => "application/typescript",
            ModuleDialect::Jsx => "text/jsx",
            ModuleDialect::TypedJsx => "text/tsx",
            ModuleDialect::Json => "application/json",
        }
    }
}

fn dialect_headers(dialect: ModuleDialect) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("content-type".to_string(), dialect.content_type().to_string());
    headers
}

pub struct DeployLoader {
    store: Arc<SourceStore>,
    cache: Arc<ModuleCache>,
    warnings: WarningSink,
}

impl DeployLoader {
    pub fn new(store: Arc<SourceStore>, cache: Arc<ModuleCache>, warnings: WarningSink) -> Self {
        DeployLoader {
            store,
            cache,
            warnings,
        }
    }

    fn load_store_module(
        &self,
        specifier: &ModuleSpecifier,
    ) -> Result<(String, ModuleDialect), io::Error> {
        let path = store_path_of(specifier);
        match self.store.get(&path) {
            Some(content) if !content.trim().is_empty() => {
                Ok((content.to_string(), ModuleDialect::from_path(&path)))
            }
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Module '{}' is empty", path),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Module '{}' is not in the source set", path),
            )),
        }
    }
}

impl Loader for DeployLoader {
    fn load(&self, specifier: &ModuleSpecifier, _options: LoadOptions) -> LoadFuture {
        let specifier = specifier.clone();
        match specifier.scheme() {
            "file" => {
                let result = self.load_store_module(&specifier);
                Box::pin(async move {
                    match result {
                        Ok((content, dialect)) => Ok(Some(LoadResponse::Module {
                            specifier,
                            maybe_headers: Some(dialect_headers(dialect)),
                            content: Arc::from(content.into_bytes()),
                            mtime: None,
                        })),
                        Err(e) => Err(LoadError::Other(Arc::new(e))),
                    }
                })
            }
            "http" | "https" => {
                let cache = self.cache.clone();
                Box::pin(async move {
                    match fetch_remote_module(&specifier, &cache).await {
                        Ok(text) => Ok(Some(LoadResponse::Module {
                            specifier,
                            // The mirror serves the ES-module variant.
                            maybe_headers: Some(dialect_headers(ModuleDialect::Script)),
                            content: Arc::from(text.as_bytes().to_vec()),
                            mtime: None,
                        })),
                        Err(e) => Err(LoadError::Other(Arc::new(e))),
                    }
                })
            }
            _ => {
                self.warnings.push(format!(
                    "Leaving '{}' as an external import (platform builtin)",
                    specifier
                ));
                Box::pin(async move { Ok(Some(LoadResponse::External { specifier })) })
            }
        }
    }
}
