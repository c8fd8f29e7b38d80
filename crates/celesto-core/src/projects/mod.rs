//! Project-name resolution against the paginated remote listing.

use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, PROJECT_PAGE_SIZE};
use crate::error::{CelestoError, CelestoResult};

/// One project as returned by the listing endpoint. Used only to turn a
/// name into an identifier; never cached across resolutions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

/// Resolve the project a deployment should target.
///
/// With a name, pages are fetched one at a time until the first
/// case-sensitive match, so an arbitrarily long listing is never held in
/// memory and a hit on an early page stops the walk. With no name, only the
/// first page is fetched and its first entry wins. Resolution fails closed:
/// no match (or an empty account) is `NotFound`, never a silent default.
pub async fn resolve<A: ApiClient>(api: &A, name: Option<&str>) -> CelestoResult<ProjectRef> {
    match name {
        Some(wanted) => resolve_named(api, wanted).await,
        None => resolve_default(api).await,
    }
}

async fn resolve_named<A: ApiClient>(api: &A, wanted: &str) -> CelestoResult<ProjectRef> {
    let mut page = 1u32;
    loop {
        let projects = api.list_projects_page(page, PROJECT_PAGE_SIZE).await?;
        if let Some(found) = projects.iter().find(|project| project.name == wanted) {
            return Ok(found.clone());
        }
        // A short page is the last page of the listing.
        if (projects.len() as u32) < PROJECT_PAGE_SIZE {
            return Err(CelestoError::NotFound {
                status: None,
                message: format!("no project named '{wanted}'"),
            });
        }
        page += 1;
    }
}

async fn resolve_default<A: ApiClient>(api: &A) -> CelestoResult<ProjectRef> {
    let projects = api.list_projects_page(1, PROJECT_PAGE_SIZE).await?;
    projects
        .into_iter()
        .next()
        .ok_or_else(|| CelestoError::NotFound {
            status: None,
            message: "no projects exist for this account".to_string(),
        })
}
