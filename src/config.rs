//! Server configuration.
//!
//! Configuration is read from a YAML file (named by `LANTERN_CONFIG`,
//! `lantern.yaml` by default, optional) and the `LISTEN` environment
//! variable overrides the listen address. Every field has a default so an
//! empty document is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "lantern.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: Limits,
    pub cache: CacheConfig,
    pub static_files: Option<StaticFilesConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds to, e.g. `127.0.0.1:8080`.
    pub listen_addr: String,
    /// Seconds a connection may sit idle waiting for a request.
    pub idle_timeout_secs: u64,
}

/// Protocol limits enforced by the request parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_request_line: usize,
    pub max_header_name: usize,
    pub max_header_bytes: usize,
    pub max_headers: usize,
    pub max_param_name: usize,
    pub max_param_value: usize,
    pub max_body: usize,
}

/// Defaults used by cache negotiation for fresh responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_age_secs: u64,
    pub cache_control: Option<String>,
    pub vary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticFilesConfig {
    /// URL prefix the directory is served under.
    #[serde(default = "default_mount")]
    pub mount: String,
    /// Directory on disk.
    pub root: PathBuf,
}

fn default_mount() -> String {
    "/static".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            idle_timeout_secs: 60,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_request_line: 1024,
            max_header_name: 256,
            max_header_bytes: 112 * 1024,
            max_headers: 256,
            max_param_name: 64,
            max_param_value: 10 * 1024,
            max_body: 8 * 1024 * 1024,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 3600,
            cache_control: None,
            vary: None,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Config {
    /// Loads the configuration file (if present) and applies environment
    /// overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("LANTERN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut cfg = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}
