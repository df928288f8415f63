//! Configuration file and credential resolution.
//!
//! # Environment Variables
//!
//! - `SITEFOLLOW_CONFIG` - Override the config file path (e.g., `~/dotfiles/sitefollow.toml`)
//! - `SITEFOLLOW_TENANT_ID`, `SITEFOLLOW_CLIENT_ID`, `SITEFOLLOW_CLIENT_SECRET`,
//!   `SITEFOLLOW_GRAPH_URL` - read by the CLI flags of the same name
//!
//! # Resolution Priority
//!
//! 1. Command-line flag
//! 2. Environment variable
//! 3. Config file entry
//! 4. Built-in default (endpoints and follow tuning only)

use crate::cli::AuthArgs;
use anyhow::{Context, Result};
use graphkit::backend::graph::{DEFAULT_GRAPH_URL, DEFAULT_LOGIN_URL};
use graphkit::{Credentials, FollowOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "SITEFOLLOW_CONFIG";

/// Contents of `config.toml`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub graph_url: Option<String>,
    pub login_url: Option<String>,
    pub follow: FollowConfig,
}

/// The `[follow]` table. Also used to carry CLI overrides.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub pair_delay_ms: Option<u64>,
}

impl FollowConfig {
    /// Values from `overrides` where set, else from `self`.
    pub fn overlay(&self, overrides: &Self) -> Self {
        Self {
            max_attempts: overrides.max_attempts.or(self.max_attempts),
            retry_delay_ms: overrides.retry_delay_ms.or(self.retry_delay_ms),
            pair_delay_ms: overrides.pair_delay_ms.or(self.pair_delay_ms),
        }
    }

    /// Engine options, filling unset values with the engine defaults.
    pub fn to_options(&self, dry_run: bool) -> FollowOptions {
        let defaults = FollowOptions::default();
        FollowOptions {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            retry_delay: self
                .retry_delay_ms
                .map_or(defaults.retry_delay, Duration::from_millis),
            pair_delay: self
                .pair_delay_ms
                .map_or(defaults.pair_delay, Duration::from_millis),
            dry_run,
        }
    }
}

/// Path of the config file.
///
/// Priority:
/// 1. `SITEFOLLOW_CONFIG` env var
/// 2. `<platform config dir>/sitefollow/config.toml`
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        let path = expand(&path);
        log::debug!("Using config file from {}: {}", ENV_CONFIG, path.display());
        return Ok(path);
    }

    let dir = dirs::config_dir().context("Could not determine config directory")?;
    let path = dir.join("sitefollow").join("config.toml");
    log::debug!("Using default config file: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

impl Config {
    /// Load the config from its default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load the config from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Credentials from flags/env, falling back to the file.
    ///
    /// Missing fields come back empty; authentication reports which one.
    pub fn credentials(&self, args: &AuthArgs) -> Credentials {
        let pick = |flag: &Option<String>, file: &Option<String>| {
            flag.clone().or_else(|| file.clone()).unwrap_or_default()
        };
        Credentials::new(
            pick(&args.tenant_id, &self.tenant_id),
            pick(&args.client_id, &self.client_id),
            pick(&args.client_secret, &self.client_secret),
        )
    }

    /// Graph base URL.
    pub fn graph_url(&self, args: &AuthArgs) -> String {
        args.graph_url
            .clone()
            .or_else(|| self.graph_url.clone())
            .unwrap_or_else(|| DEFAULT_GRAPH_URL.to_string())
    }

    /// Identity provider base URL.
    pub fn login_url(&self) -> String {
        self.login_url
            .clone()
            .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string())
    }
}
