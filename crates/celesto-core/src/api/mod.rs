//! HTTP transport to the Celesto service.
//!
//! [`Connection`] owns the authenticated reqwest client; the [`ApiClient`]
//! trait is the seam the resolver and deploy pipeline talk through, so both
//! are testable against in-memory fakes without a network.

mod classify;

use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

pub use classify::{DEFAULT_RETRY_AFTER, classify};

use crate::bundle::BUNDLE_FILE_NAME;
use crate::config::ConnectionConfig;
use crate::deploy::DeploymentResult;
use crate::error::{CelestoError, CelestoResult};
use crate::projects::ProjectRef;

/// Page size used when walking the project listing.
pub const PROJECT_PAGE_SIZE: u32 = 50;

/// One multipart deployment upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub description: String,
    pub env: HashMap<String, String>,
    pub project_id: String,
    pub bundle: Vec<u8>,
}

/// Remote API surface consumed by the resolver and the deploy pipeline.
///
/// Implemented by [`Connection`] against the real service and by in-memory
/// fakes in tests; callers own the transport the way the pipeline here only
/// owns the semantics.
#[allow(async_fn_in_trait)]
pub trait ApiClient {
    /// Fetch one page of the project listing. Pages are 1-based; a page
    /// shorter than `page_size` is the final page.
    async fn list_projects_page(&self, page: u32, page_size: u32)
    -> CelestoResult<Vec<ProjectRef>>;

    /// Upload a bundle and return the service's deployment outcome.
    async fn upload_bundle(&self, upload: UploadRequest) -> CelestoResult<DeploymentResult>;
}

/// Authenticated HTTP connection to a Celesto service.
#[derive(Debug, Clone)]
pub struct Connection {
    base_url: Url,
    api_key: String,
    http: reqwest::Client,
}

impl Connection {
    /// Build a connection from resolved configuration.
    ///
    /// The client-wide timeout is the cancellation boundary for every call:
    /// a request cut off by it surfaces as a `Network` error.
    pub fn new(config: &ConnectionConfig) -> CelestoResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|err| {
            CelestoError::Configuration(format!("invalid base URL '{}': {err}", config.base_url))
        })?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("celesto/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|err| CelestoError::Network {
                message: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> CelestoResult<Url> {
        self.base_url.join(path).map_err(|err| {
            CelestoError::Configuration(format!("invalid endpoint path '{path}': {err}"))
        })
    }

    /// Drain a response and run it through the classifier, keeping the
    /// status for payload-shape errors.
    async fn read_response(response: reqwest::Response) -> CelestoResult<(u16, serde_json::Value)> {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await.map_err(network_error)?;
        let value = classify(status, retry_after.as_deref(), &body)?;
        Ok((status, value))
    }
}

impl ApiClient for Connection {
    async fn list_projects_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> CelestoResult<Vec<ProjectRef>> {
        let url = self.endpoint("/api/projects")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .query(&[("page", page), ("page_size", page_size)])
            .send()
            .await
            .map_err(network_error)?;

        let (status, body) = Self::read_response(response).await?;
        let listing: ProjectListing =
            serde_json::from_value(body).map_err(|err| CelestoError::Server {
                status,
                message: format!("unexpected project listing payload: {err}"),
            })?;
        Ok(listing.projects)
    }

    async fn upload_bundle(&self, upload: UploadRequest) -> CelestoResult<DeploymentResult> {
        let url = self.endpoint("/api/agents/deploy")?;
        let env_json = serde_json::to_string(&upload.env).map_err(|err| {
            CelestoError::Configuration(format!("environment map is not serializable: {err}"))
        })?;
        let bundle_part = reqwest::multipart::Part::bytes(upload.bundle)
            .file_name(BUNDLE_FILE_NAME)
            .mime_str("application/gzip")
            .map_err(|err| CelestoError::Network {
                message: format!("failed to build multipart body: {err}"),
            })?;
        let form = reqwest::multipart::Form::new()
            .text("name", upload.name)
            .text("description", upload.description)
            .text("env", env_json)
            .text("project_id", upload.project_id)
            .part("bundle", bundle_part);

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let (status, body) = Self::read_response(response).await?;
        serde_json::from_value(body).map_err(|err| CelestoError::Server {
            status,
            message: format!("unexpected deployment payload: {err}"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProjectListing {
    #[serde(default)]
    projects: Vec<ProjectRef>,
}

fn network_error(err: reqwest::Error) -> CelestoError {
    CelestoError::Network {
        message: err.to_string(),
    }
}
