//! Deployment pipeline: resolve the project, bundle the folder, upload.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, UploadRequest};
use crate::bundle;
use crate::error::{CelestoError, CelestoResult};
use crate::ignore::{self, IGNORE_FILE_NAME};
use crate::projects::{self, ProjectRef};

/// Options for one deployment.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Agent name shown by the service.
    pub name: String,
    /// Agent description.
    pub description: String,
    /// Environment variables shipped with the agent.
    pub env: HashMap<String, String>,
    /// Target project display name; `None` deploys to the account's first
    /// project.
    pub project: Option<String>,
    /// Ignore-file override; defaults to `.celestoignore` in the folder
    /// root.
    pub ignore_file: Option<PathBuf>,
}

impl DeployOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            env: HashMap::new(),
            project: None,
            ignore_file: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_ignore_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignore_file = Some(path.into());
        self
    }
}

/// Deployment state reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Ready,
    Building,
}

/// Success payload of a deployment upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub status: DeploymentStatus,
    pub deployment_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome of one deployment, including non-fatal warnings (today only the
/// lenient ignore-file boundary produces them).
#[derive(Debug)]
pub struct DeployReport {
    pub result: DeploymentResult,
    pub project: ProjectRef,
    pub warnings: Vec<String>,
}

/// Deploys agent folders through an [`ApiClient`].
#[derive(Debug)]
pub struct Deployment<A> {
    api: A,
}

impl<A: ApiClient> Deployment<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Deploy the folder at `root`.
    ///
    /// Resolves the target project first, then filters and bundles the
    /// folder, then uploads. A broken ignore file downgrades to an
    /// unfiltered bundle with a warning; everything else fails the call.
    pub async fn deploy(&self, root: &Path, options: DeployOptions) -> CelestoResult<DeployReport> {
        let meta = fs::metadata(root).map_err(|err| CelestoError::io(root, err))?;
        if !meta.is_dir() {
            return Err(CelestoError::io(
                root,
                io::Error::new(io::ErrorKind::InvalidInput, "agent path is not a directory"),
            ));
        }

        let project = projects::resolve(&self.api, options.project.as_deref()).await?;

        let mut warnings = Vec::new();
        let ignore_path = options
            .ignore_file
            .clone()
            .unwrap_or_else(|| root.join(IGNORE_FILE_NAME));
        let loaded = ignore::load_ignore_file(&ignore_path);
        warnings.extend(loaded.warning);

        let bundle = bundle::build_bundle(root, &loaded.rules)?;
        tracing::debug!(
            bytes = bundle.len(),
            project = %project.id,
            rules = loaded.rules.len(),
            "bundle built"
        );

        let result = self
            .api
            .upload_bundle(UploadRequest {
                name: options.name,
                description: options.description,
                env: options.env,
                project_id: project.id.clone(),
                bundle,
            })
            .await?;

        Ok(DeployReport {
            result,
            project,
            warnings,
        })
    }
}
