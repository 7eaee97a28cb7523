// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::DEFAULT_STEALTH_USER_AGENT;
use crate::cache::DEFAULT_CLEAR_INTERVAL;
use crate::pool::DEFAULT_BATCH_SIZE;
use crate::sources::{ebay, headfi, mart, reddit};

pub const ENV_CONFIG_PATH: &str = "AVDEALS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/avdeals.toml";

pub const ENV_CACHE_CLEAR_SECS: &str = "AVDEALS_CACHE_CLEAR_SECS";
pub const ENV_VERIFY_BATCH: &str = "AVDEALS_VERIFY_BATCH";
pub const ENV_SELECTOR_TIMEOUT_MS: &str = "AVDEALS_SELECTOR_TIMEOUT_MS";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

fn default_sources() -> Vec<String> {
    [ebay::ENDPOINT, headfi::ENDPOINT, mart::ENDPOINT, reddit::ENDPOINT]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_cache_clear_secs() -> u64 {
    DEFAULT_CLEAR_INTERVAL.as_secs()
}
fn default_verify_batch() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_headless() -> bool {
    true
}
fn default_reddit_max() -> usize {
    reddit::DEFAULT_MAX_LISTINGS
}
fn default_user_agent() -> String {
    DEFAULT_STEALTH_USER_AGENT.to_string()
}

/// A source served by another instance of this service (or anything with
/// the same `GET <base_url><endpoint>?query=` contract).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSourceConfig {
    pub name: String,
    pub base_url: String,
    /// Path appended to `base_url`, e.g. `/api/ebay`.
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Marketplace adapters to register, by endpoint name.
    pub sources: Vec<String>,
    pub cache_clear_secs: u64,
    pub verify_batch_size: usize,
    pub selector_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    /// Falls back to `$CHROME_EXECUTABLE`, then a `PATH` scan.
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
    pub reddit_max_listings: usize,
    pub stealth_user_agent: String,
    pub remote: Vec<RemoteSourceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            cache_clear_secs: default_cache_clear_secs(),
            verify_batch_size: default_verify_batch(),
            selector_timeout_ms: default_timeout_ms(),
            navigation_timeout_ms: default_timeout_ms(),
            chrome_executable: None,
            headless: default_headless(),
            reddit_max_listings: default_reddit_max(),
            stealth_user_agent: default_user_agent(),
            remote: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s).context("parsing avdeals config")?;
        Ok(cfg.sanitized())
    }

    /// Load from an explicit path, then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $AVDEALS_CONFIG_PATH (must exist)
    /// 2) config/avdeals.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env(|k| std::env::var(k).ok())?;
        Ok(cfg.sanitized())
    }

    /// Override fields from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_CACHE_CLEAR_SECS) {
            self.cache_clear_secs = parse_env(ENV_CACHE_CLEAR_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_VERIFY_BATCH) {
            self.verify_batch_size = parse_env(ENV_VERIFY_BATCH, &v)?;
        }
        if let Some(v) = lookup(ENV_SELECTOR_TIMEOUT_MS) {
            self.selector_timeout_ms = parse_env(ENV_SELECTOR_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_CHROME_EXECUTABLE) {
            if !v.trim().is_empty() {
                self.chrome_executable = Some(PathBuf::from(v.trim()));
            }
        }
        Ok(())
    }

    fn sanitized(mut self) -> Self {
        if self.cache_clear_secs == 0 {
            self.cache_clear_secs = default_cache_clear_secs();
        }
        if self.verify_batch_size == 0 {
            self.verify_batch_size = default_verify_batch();
        }
        if self.selector_timeout_ms == 0 {
            self.selector_timeout_ms = default_timeout_ms();
        }
        if self.navigation_timeout_ms == 0 {
            self.navigation_timeout_ms = default_timeout_ms();
        }
        if self.stealth_user_agent.trim().is_empty() {
            self.stealth_user_agent = default_user_agent();
        }

        let mut seen = std::collections::BTreeSet::new();
        self.sources = self
            .sources
            .iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        self
    }

    pub fn cache_clear_interval(&self) -> Duration {
        Duration::from_secs(self.cache_clear_secs)
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("invalid {key}={raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.sources, vec!["ebay", "headfi", "mart", "reddit"]);
        assert_eq!(cfg.cache_clear_interval(), Duration::from_secs(3600));
        assert_eq!(cfg.verify_batch_size, 10);
    }

    #[test]
    fn sanitizes_zeroes_and_source_names() {
        let cfg = AppConfig::from_toml_str(
            r#"
            sources = [" eBay ", "", "ebay", "headfi"]
            verify_batch_size = 0
            cache_clear_secs = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.sources, vec!["ebay", "headfi"]);
        assert_eq!(cfg.verify_batch_size, 10);
        assert_eq!(cfg.cache_clear_secs, 3600);
    }

    #[test]
    fn env_overrides_apply_and_bad_values_error() {
        let vars: HashMap<&str, &str> = [
            (ENV_CACHE_CLEAR_SECS, "60"),
            (ENV_VERIFY_BATCH, "4"),
            (ENV_CHROME_EXECUTABLE, "/opt/chrome/chrome"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AppConfig::default();
        cfg.apply_env(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.cache_clear_secs, 60);
        assert_eq!(cfg.verify_batch_size, 4);
        assert_eq!(cfg.chrome_executable, Some(PathBuf::from("/opt/chrome/chrome")));

        let err = cfg
            .apply_env(|k| (k == ENV_VERIFY_BATCH).then(|| "ten".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_VERIFY_BATCH));
    }
}
