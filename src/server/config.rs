//! Configuration loading for repurposed.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag; must exist)
//! 2. `~/.repurpose/config.toml` (user)
//! 3. `/etc/repurpose/config.toml` (system)
//! 4. built-in defaults
//!
//! A few settings can be overridden from the environment afterwards
//! (`OPENAI_MODEL`, `PRICING_INPUT_PER_1K`, `PRICING_OUTPUT_PER_1K`).
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.repurpose/secrets.toml` (user, must be 0600)
//! 2. `/etc/repurpose/secrets.toml` (system, must be 0600)
//!
//! and fall back to `OPENAI_API_KEY` in the environment.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::pipeline::generator::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::providers::RetryConfig;
use crate::providers::openai::{API_KEY_ENV, DEFAULT_BASE_URL};
use crate::ratelimit::RatePolicy;
use crate::usage::Pricing;
use crate::{RepurposeError, Result};

const MODEL_ENV: &str = "OPENAI_MODEL";
const PRICING_INPUT_ENV: &str = "PRICING_INPUT_PER_1K";
const PRICING_OUTPUT_ENV: &str = "PRICING_OUTPUT_PER_1K";

/// Daemon configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3000).
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            limits: LimitsConfig::default(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:3000".to_string()
}

/// Per-caller rate limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Requests allowed per window (default: 10).
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Window length in seconds (default: 60).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// How often expired buckets are dropped, in seconds (default: 300).
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            prune_interval_secs: default_prune_interval(),
        }
    }
}

impl LimitsConfig {
    pub fn rate_policy(&self) -> RatePolicy {
        RatePolicy {
            max_requests: self.max_requests,
            window: Duration::from_secs(self.window_secs),
        }
    }
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_prune_interval() -> u64 {
    300
}

/// Model provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-attempt deadline in seconds (default: 45).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retries after the first attempt (default: 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff before the first retry, in milliseconds (default: 400).
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_retries(self.max_retries)
            .base_delay(Duration::from_millis(self.base_delay_ms))
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_timeout() -> u64 {
    45
}

fn default_max_retries() -> u32 {
    1
}

fn default_base_delay() -> u64 {
    400
}

/// Persistence settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// SQLite database for the cache and usage log. Without it both live
    /// in memory and are lost on restart.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Candidate locations for `file_name`, most specific first:
/// `~/.repurpose/`, then `/etc/repurpose/`.
fn search_paths(file_name: &str) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".repurpose").join(file_name));
    }
    paths.push(Path::new("/etc/repurpose").join(file_name));
    paths
}

fn first_existing(file_name: &str) -> Option<PathBuf> {
    search_paths(file_name).into_iter().find(|p| p.exists())
}

fn read_toml<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        RepurposeError::Configuration(format!("Failed to read {what} file {path:?}: {e}"))
    })?;
    toml::from_str(&content).map_err(|e| {
        RepurposeError::Configuration(format!("Failed to parse {what} file {path:?}: {e}"))
    })
}

impl Config {
    /// Load configuration from the standard locations, then apply
    /// environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = match explicit_path {
            Some(path) if path.exists() => Some(path.to_path_buf()),
            Some(path) => {
                return Err(RepurposeError::Configuration(format!(
                    "Config file not found: {path:?}"
                )));
            }
            None => first_existing("config.toml"),
        };
        let mut config: Config = match path {
            Some(path) => read_toml(&path, "config")?,
            None => Config::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from an environment lookup. Unparseable values are
    /// ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            self.provider.model = model.trim().to_string();
        }
        if let Some(price) = parse_price(&lookup, PRICING_INPUT_ENV) {
            self.pricing.input_per_1k = price;
        }
        if let Some(price) = parse_price(&lookup, PRICING_OUTPUT_ENV) {
            self.pricing.output_per_1k = price;
        }
    }
}

fn parse_price<F>(lookup: &F, name: &str) -> Option<f64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            warn!(variable = name, value = %raw, "ignoring invalid price override");
            None
        }
    }
}

impl Secrets {
    /// Load secrets from the first secrets file found, after checking its
    /// permissions.
    ///
    /// Returns empty secrets if no file exists ([`Secrets::api_key`] then
    /// falls back to the environment).
    pub fn load() -> Result<Self> {
        match first_existing("secrets.toml") {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Secrets::default()),
        }
    }

    /// Read a secrets file, refusing one readable by group or others.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        read_toml(path, "secrets")
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    pub fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            RepurposeError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(RepurposeError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    pub fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// The OpenAI key from the secrets file, falling back to `OPENAI_API_KEY`.
    /// Blank values count as missing.
    pub fn api_key(&self) -> Option<String> {
        self.openai
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }
}
