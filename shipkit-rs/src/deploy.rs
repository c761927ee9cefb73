//! Deployment orchestration.
//!
//! Drives one request end to end: validate the mode selection, resolve the
//! effective file set (direct, patched against stored source, or delegated
//! to template provisioning), bundle, enforce size budgets, build the
//! manifest and archives, and upload. Every failure is converted here into
//! a structured [`DeployError`]; partial work is discarded, never
//! committed.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::archive::{package_bundle, package_source, BUNDLE_FILE_NAME};
use crate::bundler::{self, ModuleCache};
use crate::control_plane::{ApiError, ControlPlane, DeploymentUpload};
use crate::entrypoint::resolve_entry_point;
use crate::error::DeployError;
use crate::limits::{check_bundle_size, check_source_size};
use crate::manifest::build_manifest;
use crate::project_config::ProjectConfig;
use crate::source_store::SourceStore;

/// Stored source files are fetched this many at a time; batches run
/// sequentially, fetches within a batch concurrently.
pub const FILE_FETCH_BATCH_SIZE: usize = 10;

/// Project name used when neither the request nor package.json names one.
const FALLBACK_PROJECT_NAME: &str = "untitled-app";

/// Wire shape of a deployment request. Exactly one of `files`, `template`
/// or `changes` must be set; validation turns this loose shape into the
/// strict internal mode.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    /// Full file set: path → content.
    #[serde(default)]
    pub files: Option<BTreeMap<String, String>>,
    /// Name of a starter template to provision instead of bundling.
    #[serde(default)]
    pub template: Option<String>,
    /// Patch against a project's stored source: path → new content, or
    /// `null` to delete.
    #[serde(default)]
    pub changes: Option<BTreeMap<String, Option<String>>>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    /// Free-form deployment message passed through to the control plane.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub compatibility_flags: Option<Vec<String>>,
}

#[derive(Debug)]
enum DeployMode {
    Files(BTreeMap<String, String>),
    Template(String),
    Changes {
        project_id: String,
        patch: BTreeMap<String, Option<String>>,
    },
}

#[derive(Debug, Default)]
struct RequestOptions {
    project_name: Option<String>,
    message: Option<String>,
    compatibility_flags: Option<Vec<String>>,
}

impl DeployRequest {
    fn into_mode(self) -> Result<(DeployMode, RequestOptions), DeployError> {
        let DeployRequest {
            files,
            template,
            changes,
            project_id,
            project_name,
            message,
            compatibility_flags,
        } = self;

        let options = RequestOptions {
            project_name,
            message,
            compatibility_flags,
        };

        let selected =
            usize::from(files.is_some()) + usize::from(template.is_some()) + usize::from(changes.is_some());
        if selected != 1 {
            return Err(DeployError::validation(
                "Exactly one of `files`, `template` or `changes` must be provided",
            ));
        }

        if let Some(files) = files {
            if project_id.is_some() {
                return Err(DeployError::validation(
                    "`files` mode does not take `projectId`; use `changes` to update an existing project",
                ));
            }
            return Ok((DeployMode::Files(files), options));
        }

        if let Some(template) = template {
            if project_id.is_some() {
                return Err(DeployError::validation(
                    "`template` mode does not take `projectId`",
                ));
            }
            return Ok((DeployMode::Template(template), options));
        }

        let patch = changes.expect("one mode is selected");
        let Some(project_id) = project_id else {
            return Err(DeployError::validation(
                "`changes` mode requires `projectId`",
            ));
        };
        Ok((DeployMode::Changes { project_id, patch }, options))
    }
}

/// Successful deployment, serializable as the response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySummary {
    pub project_id: String,
    pub deployment_id: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn stored_source_unavailable(project_id: &str) -> DeployError {
    DeployError::not_found(
        format!("Stored source for project '{}' was not found", project_id),
        Some(
            "Deploy with the full `files` set instead; the project may predate source storage"
                .to_string(),
        ),
    )
}

/// Fetch a project's full stored file set: list the tree, then pull file
/// contents in sequential batches of [`FILE_FETCH_BATCH_SIZE`] with the
/// fetches inside each batch running concurrently. Failures are aggregated
/// per batch.
async fn fetch_stored_source(
    api: &impl ControlPlane,
    project_id: &str,
) -> Result<SourceStore, DeployError> {
    let tree = api.fetch_source_tree(project_id).await.map_err(|e| {
        if e.is_not_found() {
            stored_source_unavailable(project_id)
        } else {
            DeployError::deploy_failed(format!(
                "Failed to list stored source for project '{}': {}",
                project_id, e
            ))
        }
    })?;

    let paths: Vec<String> = tree
        .into_iter()
        .filter(|entry| entry.is_file())
        .map(|entry| entry.path)
        .collect();
    info!(
        "Fetching {} stored files for project '{}' in batches of {}",
        paths.len(),
        project_id,
        FILE_FETCH_BATCH_SIZE
    );

    let mut files: Vec<(String, String)> = Vec::with_capacity(paths.len());
    for batch in paths.chunks(FILE_FETCH_BATCH_SIZE) {
        let fetched = join_all(batch.iter().map(|path| async move {
            let content = api.fetch_source_file(project_id, path).await;
            (path.clone(), content)
        }))
        .await;

        let mut not_found = false;
        let mut failures: Vec<String> = Vec::new();
        for (path, result) in fetched {
            match result {
                Ok(content) => files.push((path, content)),
                Err(e) => {
                    not_found |= e.is_not_found();
                    failures.push(format!("{}: {}", path, e));
                }
            }
        }
        if !failures.is_empty() {
            if not_found {
                return Err(stored_source_unavailable(project_id));
            }
            return Err(DeployError::deploy_failed(format!(
                "Failed to fetch stored source for project '{}': {}",
                project_id,
                failures.join("; ")
            )));
        }
    }

    Ok(SourceStore::from_files(files))
}

/// Run one deployment request to completion.
pub async fn deploy(
    api: &impl ControlPlane,
    request: DeployRequest,
) -> Result<DeploySummary, DeployError> {
    let (mode, options) = request.into_mode()?;

    // Template deployments delegate to the provisioning path and bypass the
    // bundler entirely.
    if let DeployMode::Template(template) = &mode {
        info!("Provisioning from template '{}'", template);
        let provisioned = api
            .provision_from_template(template, options.project_name.as_deref())
            .await
            .map_err(|e| match e {
                ApiError::NotFound(message) => DeployError::not_found(message, None),
                ApiError::Upstream(message) => DeployError::deploy_failed(message),
            })?;
        return Ok(DeploySummary {
            project_id: provisioned.project_id,
            deployment_id: provisioned.deployment_id,
            status: provisioned.status,
            url: provisioned.url,
            warnings: Vec::new(),
        });
    }

    // Resolve the effective file set.
    let (store, existing_project) = match mode {
        DeployMode::Files(files) => (SourceStore::from_files(files), None),
        DeployMode::Changes { project_id, patch } => {
            let stored = fetch_stored_source(api, &project_id).await?;
            let patched = stored.apply_patch(&patch);
            (patched, Some(project_id))
        }
        DeployMode::Template(_) => unreachable!("handled above"),
    };
    if store.is_empty() {
        return Err(DeployError::validation(
            "The resulting file set is empty; nothing to deploy",
        ));
    }

    check_source_size(&store)?;

    let config = ProjectConfig::from_store(&store)?;
    let entrypoint = resolve_entry_point(&store, &config)?;

    let store = Arc::new(store);
    let config = Arc::new(config);
    // Per-build module arena; dropped with the build, never shared across
    // invocations.
    let cache = Arc::new(ModuleCache::default());
    let artifact = bundler::bundle(store.clone(), config.clone(), &entrypoint, cache).await?;

    check_bundle_size(&artifact.code)?;

    let (project_id, project_url, bindings) = match existing_project {
        Some(project_id) => {
            // New resources may not exist yet and a binding lookup must
            // never sink an otherwise valid deployment.
            let bindings = match api.fetch_bindings(&project_id).await {
                Ok(bindings) => bindings,
                Err(e) => {
                    warn!(
                        "Could not fetch bindings for project '{}': {}; deploying without",
                        project_id, e
                    );
                    Vec::new()
                }
            };
            (project_id, None, bindings)
        }
        None => {
            let name = options
                .project_name
                .clone()
                .or_else(|| config.name.clone())
                .unwrap_or_else(|| FALLBACK_PROJECT_NAME.to_string());
            let created = api.create_project(&name).await.map_err(|e| {
                DeployError::deploy_failed(format!("Failed to create project '{}': {}", name, e))
            })?;
            (created.project_id, created.url, Vec::new())
        }
    };

    // The control plane runs the bundle under its canonical archive name.
    let manifest = build_manifest(BUNDLE_FILE_NAME, options.compatibility_flags, &bindings);
    let source_archive = package_source(&store)?;
    let bundle_archive = package_bundle(&artifact.code)?;

    let receipt = api
        .upload_deployment(DeploymentUpload {
            project_id: &project_id,
            manifest: &manifest,
            bundle_archive: &bundle_archive,
            source_archive: Some(&source_archive),
            message: options.message.as_deref(),
        })
        .await
        .map_err(|e| DeployError::deploy_failed(format!("Deployment upload failed: {}", e)))?;

    info!(
        "Deployed project '{}' ({}, {} bytes bundled)",
        project_id,
        receipt.status,
        artifact.code.len()
    );

    Ok(DeploySummary {
        project_id,
        deployment_id: Some(receipt.deployment_id),
        status: receipt.status,
        url: project_url,
        warnings: artifact.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn files_request() -> DeployRequest {
        DeployRequest {
            files: Some(BTreeMap::from([(
                "index.ts".to_string(),
                "export {};".to_string(),
            )])),
            ..Default::default()
        }
    }

    #[test]
    fn test_exactly_one_mode_is_required() {
        let none = DeployRequest::default();
        assert_eq!(
            none.into_mode().unwrap_err().code(),
            ErrorCode::ValidationError
        );

        let both = DeployRequest {
            template: Some("starter".to_string()),
            ..files_request()
        };
        assert_eq!(
            both.into_mode().unwrap_err().code(),
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn test_changes_requires_project_id() {
        let request = DeployRequest {
            changes: Some(BTreeMap::new()),
            ..Default::default()
        };
        let err = request.into_mode().unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert!(err.to_string().contains("projectId"));
    }

    #[test]
    fn test_template_forbids_project_id() {
        let request = DeployRequest {
            template: Some("starter".to_string()),
            project_id: Some("p-1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            request.into_mode().unwrap_err().code(),
            ErrorCode::ValidationError
        );
    }

    #[test]
    fn test_patch_null_deserializes_as_delete() {
        let request: DeployRequest = serde_json::from_str(
            r#"{"projectId": "p-1", "changes": {"a.ts": null, "b.ts": "export {};"}}"#,
        )
        .unwrap();
        let (mode, _) = request.into_mode().unwrap();
        match mode {
            DeployMode::Changes { project_id, patch } => {
                assert_eq!(project_id, "p-1");
                assert_eq!(patch["a.ts"], None);
                assert_eq!(patch["b.ts"].as_deref(), Some("export {};"));
            }
            other => panic!("unexpected mode: {:?}", other),
        }
    }
}
