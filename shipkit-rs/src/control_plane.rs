//! Contract consumed from the hosting control plane.
//!
//! The HTTP client, authentication and template provisioning live outside
//! this crate; the pipeline only sees this trait. Tests supply a mock.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::manifest::{BindingDescriptor, DeploymentManifest};

/// Upstream failure, discriminated just enough for the orchestrator to map
/// "not found" differently from other errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// One entry of a project's stored source tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTreeEntry {
    pub path: String,
    pub size: u64,
    pub kind: String,
}

impl SourceTreeEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

#[derive(Debug, Clone)]
pub struct CreatedProject {
    pub project_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub deployment_id: String,
    pub status: String,
}

/// Result of delegating a whole deployment to the template provisioning
/// path; the bundler is bypassed entirely.
#[derive(Debug, Clone)]
pub struct ProvisionedProject {
    pub project_id: String,
    pub deployment_id: Option<String>,
    pub status: String,
    pub url: Option<String>,
}

/// Everything handed to the control plane for one deployment upload.
pub struct DeploymentUpload<'a> {
    pub project_id: &'a str,
    pub manifest: &'a DeploymentManifest,
    pub bundle_archive: &'a [u8],
    pub source_archive: Option<&'a [u8]>,
    pub message: Option<&'a str>,
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn fetch_source_tree(&self, project_id: &str) -> Result<Vec<SourceTreeEntry>, ApiError>;

    async fn fetch_source_file(&self, project_id: &str, path: &str) -> Result<String, ApiError>;

    /// Bindings of an existing project. Callers tolerate failure here: new
    /// projects have no prior resources.
    async fn fetch_bindings(&self, project_id: &str) -> Result<Vec<BindingDescriptor>, ApiError>;

    async fn create_project(&self, name: &str) -> Result<CreatedProject, ApiError>;

    async fn provision_from_template(
        &self,
        template: &str,
        project_name: Option<&str>,
    ) -> Result<ProvisionedProject, ApiError>;

    async fn upload_deployment(
        &self,
        upload: DeploymentUpload<'_>,
    ) -> Result<UploadReceipt, ApiError>;
}
