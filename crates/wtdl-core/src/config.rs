use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// libcurl accepts receive buffers between 1 KiB and 10 MiB.
const MIN_BUFFER_BYTES: usize = 1024;
const MAX_BUFFER_BYTES: usize = 10 * 1024 * 1024;

/// Retry policy parameters (`[network.retry]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first). 1 = no retry.
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Settings shared by every network call (API pages and assets alike).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Connect timeout in seconds (None = libcurl default, effectively unbounded transfer).
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout in seconds (None = no timeout).
    pub timeout_secs: Option<u64>,
    /// The API crawl aborts after this many transport failures in a row.
    /// Asset downloads never abort; their failures are only reported.
    pub max_consecutive_failures: u32,
    pub retry: RetryConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: None,
            timeout_secs: None,
            max_consecutive_failures: 5,
            retry: RetryConfig::default(),
        }
    }
}

/// Paginated API crawl (`[fetch]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// A 404 only ends the crawl once the id is above this value; below it, 404s are gaps.
    pub end_threshold: u64,
    /// Verify the API's TLS certificate. Off by default: the API is reached with verification bypassed.
    pub verify_tls: bool,
    /// Optional hard stop after this id, regardless of responses.
    pub max_id: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            end_threshold: 250,
            verify_tls: false,
            max_id: None,
        }
    }
}

/// What the extractor does when two payloads produce the same document name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Later payload replaces the earlier document (reported as a collision).
    #[default]
    Overwrite,
    /// Later payload is written as `{slug}_{id}.md` instead.
    AppendId,
}

/// `[extract]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub collision: CollisionPolicy,
}

/// Asset localization (`[assets]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Origin that root-relative references are resolved against.
    pub base_url: String,
    /// Path prefix identifying root-relative references; must start and end with `/`.
    pub reference_prefix: String,
    pub verify_tls: bool,
    /// Send the API headers/cookies with asset requests too.
    pub use_session: bool,
    /// Receive buffer size; the body is written to disk in chunks of at most this size.
    pub buffer_bytes: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://academy.hackthebox.com".to_string(),
            reference_prefix: "/storage/walkthroughs/".to_string(),
            verify_tls: true,
            use_session: false,
            buffer_bytes: MIN_BUFFER_BYTES,
        }
    }
}

/// Global configuration loaded from `~/.config/wtdl/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WtdlConfig {
    pub fetch: FetchConfig,
    pub extract: ExtractConfig,
    pub assets: AssetsConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("assets.reference_prefix must start and end with '/', got {0:?}")]
    BadReferencePrefix(String),
    #[error("assets.base_url is not an http(s) URL: {0:?}")]
    BadBaseUrl(String),
    #[error("assets.buffer_bytes must be between 1024 and 10485760, got {0}")]
    BadBufferSize(usize),
    #[error("network.retry.max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("network.max_consecutive_failures must be at least 1")]
    ZeroFailureBudget,
}

impl WtdlConfig {
    /// Reject values the stages cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.assets.reference_prefix;
        if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
            return Err(ConfigError::BadReferencePrefix(prefix.clone()));
        }
        match url::Url::parse(&self.assets.base_url) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
            _ => return Err(ConfigError::BadBaseUrl(self.assets.base_url.clone())),
        }
        if !(MIN_BUFFER_BYTES..=MAX_BUFFER_BYTES).contains(&self.assets.buffer_bytes) {
            return Err(ConfigError::BadBufferSize(self.assets.buffer_bytes));
        }
        if self.network.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.network.max_consecutive_failures == 0 {
            return Err(ConfigError::ZeroFailureBudget);
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("wtdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<WtdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = WtdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load and validate configuration from an explicit path. The file must exist.
pub fn load_from(path: &Path) -> Result<WtdlConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: WtdlConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
