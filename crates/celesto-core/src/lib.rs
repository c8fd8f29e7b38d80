//! Celesto Core Library
//!
//! Domain logic for deploying local agent folders to the Celesto service:
//! `.celestoignore` filtering, deterministic tar.gz bundling, project
//! resolution against the paginated listing, and the typed transport layer.

pub mod api;
pub mod bundle;
pub mod config;
pub mod deploy;
pub mod error;
pub mod ignore;
pub mod projects;

/// Re-exports of commonly used types
pub mod prelude {
    // Transport
    pub use crate::api::{ApiClient, Connection, PROJECT_PAGE_SIZE, UploadRequest};

    // Bundling
    pub use crate::bundle::{BUNDLE_FILE_NAME, EntryKind, WalkEntry, build_bundle, walk_tree};

    // Configuration
    pub use crate::config::{ConfigSources, ConnectionConfig, DEFAULT_BASE_URL};

    // Deployment
    pub use crate::deploy::{
        DeployOptions, DeployReport, Deployment, DeploymentResult, DeploymentStatus,
    };

    // Errors
    pub use crate::error::{CelestoError, CelestoResult};

    // Ignore rules
    pub use crate::ignore::{IGNORE_FILE_NAME, RuleSet};

    // Projects
    pub use crate::projects::ProjectRef;
}
