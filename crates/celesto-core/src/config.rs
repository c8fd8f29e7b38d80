//! Connection configuration resolved from an explicit, ordered source list.
//!
//! Precedence: explicit value > environment variable > user config file >
//! built-in default. The process environment is captured once at the
//! boundary and passed in; nothing deeper in the call chain reads env vars
//! on its own.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CelestoError, CelestoResult};

pub const DEFAULT_BASE_URL: &str = "https://api.celesto.ai";
pub const API_KEY_ENV: &str = "CELESTO_API_KEY";
pub const BASE_URL_ENV: &str = "CELESTO_BASE_URL";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Resolved settings for one [`Connection`](crate::api::Connection).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub api_key: String,
    pub base_url: String,
    /// Per-request deadline; doubles as the cancellation bound for
    /// sequential page fetches.
    pub timeout: Duration,
}

/// Ordered configuration sources.
#[derive(Debug, Default)]
pub struct ConfigSources {
    explicit_api_key: Option<String>,
    explicit_base_url: Option<String>,
    explicit_timeout: Option<Duration>,
    env: HashMap<String, String>,
    config_file: Option<PathBuf>,
}

impl ConfigSources {
    /// Sources with nothing captured; every lookup falls through to the
    /// defaults. Mostly useful in tests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the process environment and the default config file location
    /// (`<config dir>/celesto/config.toml`).
    pub fn from_env() -> Self {
        Self {
            env: std::env::vars().collect(),
            config_file: dirs::config_dir().map(|dir| dir.join("celesto").join("config.toml")),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.explicit_api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.explicit_base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.explicit_timeout = Some(timeout);
        self
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Resolve the sources into a usable configuration.
    ///
    /// A missing API key after every source is exhausted is a
    /// `Configuration` error; there is no anonymous access.
    pub fn resolve(&self) -> CelestoResult<ConnectionConfig> {
        let file = self.load_file();

        let api_key = self
            .explicit_api_key
            .clone()
            .or_else(|| self.env.get(API_KEY_ENV).cloned())
            .or_else(|| file.as_ref().and_then(|f| f.api_key.clone()))
            .ok_or_else(|| {
                CelestoError::Configuration(format!(
                    "no API key found: pass one explicitly, set {API_KEY_ENV}, \
                     or add api_key to the config file"
                ))
            })?;

        let base_url = self
            .explicit_base_url
            .clone()
            .or_else(|| self.env.get(BASE_URL_ENV).cloned())
            .or_else(|| file.as_ref().and_then(|f| f.base_url.clone()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(ConnectionConfig {
            api_key,
            base_url,
            timeout: self.explicit_timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    fn load_file(&self) -> Option<FileConfig> {
        let path = self.config_file.as_ref()?;
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(file) => Some(file),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "ignoring unparseable config file"
                );
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    api_key: Option<String>,
    base_url: Option<String>,
}
