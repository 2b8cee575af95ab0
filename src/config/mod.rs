//! Application configuration
//!
//! Sources are applied in order, later ones winning: built-in defaults, the
//! config file, `ROOMSWEEP_*` environment variables, then command line flags
//! (applied by the CLI layer).

use crate::error::{Error, Result};
use crate::pagination::{RetryPolicy, DEFAULT_FLUSH_INTERVAL, DEFAULT_PAGE_LIMIT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "roomsweep.toml";

pub const ENV_ACCESS_TOKEN: &str = "ROOMSWEEP_ACCESS_TOKEN";
pub const ENV_HOMESERVER_URL: &str = "ROOMSWEEP_HOMESERVER_URL";
pub const ENV_DATA_DIR: &str = "ROOMSWEEP_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub homeserver_url: Option<String>,
    pub access_token: Option<String>,
    pub data_dir: PathBuf,
    pub fetch: FetchConfig,
    pub retry: RetryPolicy,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub page_limit: usize,
    pub flush_interval: usize,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub known_good_servers: Vec<String>,
    pub suspicious_localpart_len: usize,
    pub concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            homeserver_url: None,
            access_token: None,
            data_dir: PathBuf::from("./data"),
            fetch: FetchConfig::default(),
            retry: RetryPolicy::default(),
            moderation: ModerationConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            known_good_servers: vec!["matrix.org".to_string(), "gitter.im".to_string()],
            suspicious_localpart_len: 11,
            concurrency: 1,
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` (or `./roomsweep.toml` if present), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.merge_env_vars();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn merge_env_vars(&mut self) {
        self.merge_env_from(|key| std::env::var(key).ok());
    }

    /// Apply `ROOMSWEEP_*` overrides from `lookup`. Empty values are ignored.
    pub fn merge_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
        if let Some(url) = lookup(ENV_HOMESERVER_URL) {
            self.homeserver_url = Some(url);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
    }

    /// Reject values no command can run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch.page_limit == 0 {
            return Err(Error::Config("fetch.page_limit must be at least 1".into()));
        }
        if self.fetch.flush_interval == 0 {
            return Err(Error::Config(
                "fetch.flush_interval must be at least 1".into(),
            ));
        }
        if self.moderation.concurrency == 0 {
            return Err(Error::Config(
                "moderation.concurrency must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(Error::Config(
                "retry.jitter_factor must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Homeserver URL for commands that talk to the network
    pub fn require_homeserver(&self) -> Result<&str> {
        self.homeserver_url.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "No homeserver URL: pass --homeserver-url, set {ENV_HOMESERVER_URL} or homeserver_url in the config file"
            ))
        })
    }
}
