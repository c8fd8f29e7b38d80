//! End-to-end deploy pipeline tests over a fake transport.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

use celesto_core::api::{ApiClient, UploadRequest};
use celesto_core::deploy::{DeployOptions, Deployment, DeploymentResult, DeploymentStatus};
use celesto_core::error::{CelestoError, CelestoResult};
use celesto_core::ignore::IGNORE_FILE_NAME;
use celesto_core::projects::ProjectRef;
use tempfile::TempDir;

/// Transport fake: serves a one-page project listing and captures the
/// upload it receives.
struct CapturingApi {
    projects: Vec<ProjectRef>,
    captured: Mutex<Option<UploadRequest>>,
}

impl CapturingApi {
    fn new(projects: Vec<ProjectRef>) -> Self {
        Self {
            projects,
            captured: Mutex::new(None),
        }
    }

    fn captured(&self) -> UploadRequest {
        self.captured
            .lock()
            .unwrap()
            .clone()
            .expect("an upload should have been captured")
    }
}

impl ApiClient for CapturingApi {
    async fn list_projects_page(
        &self,
        page: u32,
        _page_size: u32,
    ) -> CelestoResult<Vec<ProjectRef>> {
        Ok(if page == 1 {
            self.projects.clone()
        } else {
            Vec::new()
        })
    }

    async fn upload_bundle(&self, upload: UploadRequest) -> CelestoResult<DeploymentResult> {
        *self.captured.lock().unwrap() = Some(upload);
        Ok(DeploymentResult {
            status: DeploymentStatus::Ready,
            deployment_id: "dep-123".to_string(),
            message: Some("live".to_string()),
        })
    }
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create_dir_all should succeed in test temp dirs");
    }
    std::fs::write(path, content).expect("write should succeed in test temp dirs");
}

fn bundle_entries(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(bytes));
    let mut entries = BTreeMap::new();
    for entry in archive.entries().expect("bundle should be a valid tar.gz") {
        let mut entry = entry.expect("bundle entry should be readable");
        let path = entry
            .path()
            .expect("entry should have a path")
            .to_string_lossy()
            .into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("entry should read");
        entries.insert(path, data);
    }
    entries
}

fn default_projects() -> Vec<ProjectRef> {
    vec![ProjectRef {
        id: "proj-1".to_string(),
        name: "Default".to_string(),
    }]
}

#[tokio::test]
async fn deploy_uploads_the_filtered_bundle() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("main.py"), "print('hi')");
    write_file(&tmp.path().join("cache.pyc"), "junk");
    write_file(&tmp.path().join(IGNORE_FILE_NAME), "*.pyc\n");

    let api = CapturingApi::new(default_projects());
    let deployment = Deployment::new(api);

    let options = DeployOptions::new("my-agent")
        .with_description("demo agent")
        .with_env("MODEL", "large");
    let report = deployment.deploy(tmp.path(), options).await.unwrap();

    assert_eq!(report.result.status, DeploymentStatus::Ready);
    assert_eq!(report.result.deployment_id, "dep-123");
    assert_eq!(report.project.id, "proj-1");
    assert!(report.warnings.is_empty());

    let upload = deployment.api().captured();
    assert_eq!(upload.name, "my-agent");
    assert_eq!(upload.description, "demo agent");
    assert_eq!(upload.project_id, "proj-1");
    assert_eq!(upload.env.get("MODEL").map(String::as_str), Some("large"));

    let entries = bundle_entries(&upload.bundle);
    let names: Vec<&str> = entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec![IGNORE_FILE_NAME, "main.py"]);
    assert_eq!(entries["main.py"], b"print('hi')");
}

#[tokio::test]
async fn deploy_targets_the_named_project() {
    let projects = vec![
        ProjectRef {
            id: "proj-1".to_string(),
            name: "Default".to_string(),
        },
        ProjectRef {
            id: "proj-2".to_string(),
            name: "Prod".to_string(),
        },
    ];
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("main.py"), "pass");

    let deployment = Deployment::new(CapturingApi::new(projects));
    let report = deployment
        .deploy(tmp.path(), DeployOptions::new("agent").with_project("Prod"))
        .await
        .unwrap();

    assert_eq!(report.project.id, "proj-2");
    assert_eq!(deployment.api().captured().project_id, "proj-2");
}

#[tokio::test]
async fn unknown_project_fails_before_any_upload() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("main.py"), "pass");

    let deployment = Deployment::new(CapturingApi::new(default_projects()));
    let err = deployment
        .deploy(tmp.path(), DeployOptions::new("agent").with_project("Nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, CelestoError::NotFound { .. }));
    assert!(
        deployment.api()
            .captured
            .lock()
            .unwrap()
            .is_none(),
        "nothing may be uploaded when resolution fails"
    );
}

#[tokio::test]
async fn broken_ignore_file_deploys_unfiltered_with_a_warning() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("main.py"), "pass");
    write_file(&tmp.path().join("cache.pyc"), "junk");
    std::fs::write(tmp.path().join(IGNORE_FILE_NAME), [0xff, 0xfe, 0x01]).unwrap();

    let deployment = Deployment::new(CapturingApi::new(default_projects()));
    let report = deployment
        .deploy(tmp.path(), DeployOptions::new("agent"))
        .await
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("not valid UTF-8"));

    // Filtering was disabled: everything is in the bundle.
    let entries = bundle_entries(&deployment.api().captured().bundle);
    let names: Vec<&str> = entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec![IGNORE_FILE_NAME, "cache.pyc", "main.py"]);
}

#[tokio::test]
async fn ignore_file_override_path_is_used() {
    let tmp = TempDir::new().unwrap();
    write_file(&tmp.path().join("agent").join("main.py"), "pass");
    write_file(&tmp.path().join("agent").join("notes.log"), "scratch");
    write_file(&tmp.path().join("shared-ignore"), "*.log\n");

    let deployment = Deployment::new(CapturingApi::new(default_projects()));
    let options = DeployOptions::new("agent").with_ignore_file(tmp.path().join("shared-ignore"));
    deployment
        .deploy(&tmp.path().join("agent"), options)
        .await
        .unwrap();

    let entries = bundle_entries(&deployment.api().captured().bundle);
    let names: Vec<&str> = entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["main.py"]);
}

#[tokio::test]
async fn missing_folder_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    let deployment = Deployment::new(CapturingApi::new(default_projects()));

    let err = deployment
        .deploy(&tmp.path().join("absent"), DeployOptions::new("agent"))
        .await
        .unwrap_err();
    assert!(matches!(err, CelestoError::Io { .. }));
}
