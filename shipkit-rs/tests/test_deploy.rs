//! End-to-end orchestrator tests against a mock control plane.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Mutex;

use async_trait::async_trait;
use shipkit_rs::control_plane::{
    ApiError, ControlPlane, CreatedProject, DeploymentUpload, ProvisionedProject, SourceTreeEntry,
    UploadReceipt,
};
use shipkit_rs::deploy::{deploy, DeployRequest};
use shipkit_rs::error::ErrorCode;
use shipkit_rs::limits::SOURCE_SIZE_LIMIT;
use shipkit_rs::manifest::{BindingDescriptor, DeploymentManifest};

#[derive(Debug, Clone)]
struct CapturedUpload {
    project_id: String,
    manifest: DeploymentManifest,
    bundle_files: Vec<(String, String)>,
    source_files: Vec<(String, String)>,
    message: Option<String>,
}

#[derive(Default)]
struct MockControlPlane {
    stored: BTreeMap<String, String>,
    stored_missing: bool,
    bindings: Vec<BindingDescriptor>,
    bindings_fail: bool,
    upload_fail: bool,
    calls: Mutex<Vec<String>>,
    uploads: Mutex<Vec<CapturedUpload>>,
}

impl MockControlPlane {
    fn with_stored(stored: &[(&str, &str)]) -> Self {
        MockControlPlane {
            stored: stored
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn uploads(&self) -> Vec<CapturedUpload> {
        self.uploads.lock().unwrap().clone()
    }
}

fn unzip(bytes: &[u8]) -> Vec<(String, String)> {
    let mut archive = zip_reader(bytes);
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        entries.push((file.name().to_string(), content));
    }
    entries
}

fn zip_reader(bytes: &[u8]) -> zip::ZipArchive<Cursor<Vec<u8>>> {
    zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap()
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn fetch_source_tree(&self, project_id: &str) -> Result<Vec<SourceTreeEntry>, ApiError> {
        self.record("fetch_source_tree");
        if self.stored_missing {
            return Err(ApiError::NotFound(format!(
                "no stored source for {}",
                project_id
            )));
        }
        Ok(self
            .stored
            .iter()
            .map(|(path, content)| SourceTreeEntry {
                path: path.clone(),
                size: content.len() as u64,
                kind: "file".to_string(),
            })
            .collect())
    }

    async fn fetch_source_file(&self, _project_id: &str, path: &str) -> Result<String, ApiError> {
        self.record("fetch_source_file");
        self.stored
            .get(path)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("no stored file {}", path)))
    }

    async fn fetch_bindings(&self, _project_id: &str) -> Result<Vec<BindingDescriptor>, ApiError> {
        self.record("fetch_bindings");
        if self.bindings_fail {
            return Err(ApiError::Upstream("bindings service unavailable".to_string()));
        }
        Ok(self.bindings.clone())
    }

    async fn create_project(&self, name: &str) -> Result<CreatedProject, ApiError> {
        self.record("create_project");
        Ok(CreatedProject {
            project_id: format!("p-{}", name),
            url: Some(format!("https://{}.example.app", name)),
        })
    }

    async fn provision_from_template(
        &self,
        template: &str,
        project_name: Option<&str>,
    ) -> Result<ProvisionedProject, ApiError> {
        self.record("provision_from_template");
        if template == "missing" {
            return Err(ApiError::NotFound(format!("template '{}' not found", template)));
        }
        Ok(ProvisionedProject {
            project_id: format!("p-{}", project_name.unwrap_or("template")),
            deployment_id: Some("d-template".to_string()),
            status: "deployed".to_string(),
            url: None,
        })
    }

    async fn upload_deployment(
        &self,
        upload: DeploymentUpload<'_>,
    ) -> Result<UploadReceipt, ApiError> {
        self.record("upload_deployment");
        if self.upload_fail {
            return Err(ApiError::Upstream("control plane rejected the upload".to_string()));
        }
        self.uploads.lock().unwrap().push(CapturedUpload {
            project_id: upload.project_id.to_string(),
            manifest: upload.manifest.clone(),
            bundle_files: unzip(upload.bundle_archive),
            source_files: unzip(upload.source_archive.unwrap_or(&[])),
            message: upload.message.map(str::to_string),
        });
        Ok(UploadReceipt {
            deployment_id: "d-1".to_string(),
            status: "deployed".to_string(),
        })
    }
}

fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(p, c)| (p.to_string(), c.to_string()))
        .collect()
}

fn app_files() -> BTreeMap<String, String> {
    files(&[
        (
            "src/index.ts",
            "import { greeting } from \"./greeting\";\nexport default { fetch: () => new Response(greeting(\"world\")) };\n",
        ),
        (
            "src/greeting.ts",
            "export function greeting(name: string): string { return `hello ${name}`; }\n",
        ),
        (
            "package.json",
            "{\"name\": \"demo\", \"main\": \"src/index.ts\"}",
        ),
    ])
}

#[tokio::test]
async fn test_files_mode_deploys_end_to_end() {
    let api = MockControlPlane::default();
    let request = DeployRequest {
        files: Some(app_files()),
        message: Some("first deploy".to_string()),
        ..Default::default()
    };

    let summary = deploy(&api, request).await.unwrap();
    assert_eq!(summary.project_id, "p-demo");
    assert_eq!(summary.deployment_id.as_deref(), Some("d-1"));
    assert_eq!(summary.status, "deployed");
    assert_eq!(summary.url.as_deref(), Some("https://demo.example.app"));

    let calls = api.calls();
    assert_eq!(calls, vec!["create_project", "upload_deployment"]);

    let uploads = api.uploads();
    assert_eq!(uploads.len(), 1);
    let upload = &uploads[0];
    assert_eq!(upload.project_id, "p-demo");
    assert_eq!(upload.message.as_deref(), Some("first deploy"));

    // Manifest describes how to run the bundle.
    assert_eq!(upload.manifest.module_format, "esm");
    assert_eq!(upload.manifest.entrypoint, "index.js");
    assert_eq!(upload.manifest.compatibility_flags, vec!["nodejs_compat"]);
    assert!(upload.manifest.bindings.is_empty());

    // Bundle archive: one self-contained module under the canonical name.
    assert_eq!(upload.bundle_files.len(), 1);
    assert_eq!(upload.bundle_files[0].0, "index.js");
    assert!(upload.bundle_files[0].1.contains("greeting"));
    assert!(!upload.bundle_files[0].1.contains("./greeting"));

    // Source archive: the original file set, deterministic listing.
    let source_paths: Vec<&str> = upload.source_files.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(
        source_paths,
        vec!["package.json", "src/greeting.ts", "src/index.ts"]
    );
}

#[tokio::test]
async fn test_identical_inputs_bundle_identically() {
    let first = MockControlPlane::default();
    let second = MockControlPlane::default();
    let request = || DeployRequest {
        files: Some(app_files()),
        ..Default::default()
    };

    deploy(&first, request()).await.unwrap();
    deploy(&second, request()).await.unwrap();

    let a = &first.uploads()[0].bundle_files[0].1;
    let b = &second.uploads()[0].bundle_files[0].1;
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_two_modes_at_once_has_no_side_effects() {
    let api = MockControlPlane::default();
    let request = DeployRequest {
        files: Some(app_files()),
        template: Some("starter".to_string()),
        ..Default::default()
    };

    let err = deploy(&api, request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_oversized_source_fails_before_any_call() {
    let api = MockControlPlane::default();
    let request = DeployRequest {
        files: Some(files(&[(
            "index.ts",
            &"x".repeat(SOURCE_SIZE_LIMIT + 1),
        )])),
        ..Default::default()
    };

    let err = deploy(&api, request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::SizeLimit);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_changes_mode_patches_stored_source() {
    let mut api = MockControlPlane::with_stored(&[
        (
            "index.ts",
            "import { version } from \"./version\";\nexport default version;\n",
        ),
        ("version.ts", "export const version = \"v1\";\n"),
    ]);
    api.bindings = vec![BindingDescriptor {
        kind: "database".to_string(),
        name: "app-db".to_string(),
        config: serde_json::Value::Null,
    }];

    let request = DeployRequest {
        project_id: Some("p-existing".to_string()),
        changes: Some(BTreeMap::from([(
            "version.ts".to_string(),
            Some("export const version = \"v2\";\n".to_string()),
        )])),
        ..Default::default()
    };

    let summary = deploy(&api, request).await.unwrap();
    assert_eq!(summary.project_id, "p-existing");

    // Existing project: bindings fetched, no project created.
    let calls = api.calls();
    assert!(calls.contains(&"fetch_bindings".to_string()));
    assert!(!calls.contains(&"create_project".to_string()));

    let upload = &api.uploads()[0];
    assert_eq!(upload.manifest.bindings["database"].name, "app-db");
    assert!(upload.bundle_files[0].1.contains("v2"));
    // The patched set, not the original, is what gets stored.
    assert!(upload
        .source_files
        .iter()
        .any(|(path, content)| path == "version.ts" && content.contains("v2")));
}

#[tokio::test]
async fn test_patch_deleting_last_file_is_a_validation_error() {
    let api = MockControlPlane::with_stored(&[("a.ts", "export {};")]);
    let request = DeployRequest {
        project_id: Some("p-existing".to_string()),
        changes: Some(BTreeMap::from([("a.ts".to_string(), None)])),
        ..Default::default()
    };

    let err = deploy(&api, request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
    assert!(err.to_string().contains("empty"));
}

#[tokio::test]
async fn test_changes_against_unstored_project_suggests_files_mode() {
    let api = MockControlPlane {
        stored_missing: true,
        ..Default::default()
    };
    let request = DeployRequest {
        project_id: Some("p-old".to_string()),
        changes: Some(BTreeMap::from([(
            "index.ts".to_string(),
            Some("export {};".to_string()),
        )])),
        ..Default::default()
    };

    let err = deploy(&api, request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert!(err.suggestion().unwrap().contains("files"));
}

#[tokio::test]
async fn test_binding_fetch_failure_never_sinks_the_deploy() {
    let api = MockControlPlane {
        stored: MockControlPlane::with_stored(&[("index.ts", "export default 1;\n")]).stored,
        bindings_fail: true,
        ..Default::default()
    };
    let request = DeployRequest {
        project_id: Some("p-existing".to_string()),
        changes: Some(BTreeMap::from([(
            "extra.ts".to_string(),
            Some("export const extra = true;\n".to_string()),
        )])),
        ..Default::default()
    };

    let summary = deploy(&api, request).await.unwrap();
    assert_eq!(summary.status, "deployed");
    assert!(api.uploads()[0].manifest.bindings.is_empty());
}

#[tokio::test]
async fn test_upload_failure_surfaces_upstream_message() {
    let api = MockControlPlane {
        upload_fail: true,
        ..Default::default()
    };
    let request = DeployRequest {
        files: Some(app_files()),
        ..Default::default()
    };

    let err = deploy(&api, request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::DeployFailed);
    assert!(err.to_string().contains("rejected the upload"));
}

#[tokio::test]
async fn test_template_mode_bypasses_the_bundler() {
    let api = MockControlPlane::default();
    let request = DeployRequest {
        template: Some("starter".to_string()),
        project_name: Some("fresh".to_string()),
        ..Default::default()
    };

    let summary = deploy(&api, request).await.unwrap();
    assert_eq!(summary.project_id, "p-fresh");
    assert_eq!(summary.deployment_id.as_deref(), Some("d-template"));
    assert_eq!(api.calls(), vec!["provision_from_template"]);
}

#[tokio::test]
async fn test_unknown_template_is_not_found() {
    let api = MockControlPlane::default();
    let request = DeployRequest {
        template: Some("missing".to_string()),
        ..Default::default()
    };

    let err = deploy(&api, request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}
