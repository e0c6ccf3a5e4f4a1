use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::upstream::request::{DEFAULT_BASE_URL, MAX_BATCH_SIZE};

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cristalix open API endpoint (defaults to https://api.cristalix.gg)
    pub base_url: String,
    pub project_key: String,
    /// API token, with or without the `Bearer ` prefix
    pub token: String,
    /// Names per upstream batch request (max 50)
    pub batch_size: usize,
    pub cache_ttl: Duration,
    /// Maximum browser pages open at once
    pub max_pages: usize,
    /// Bound on a single page load or HTTP request
    pub request_timeout: Duration,
    /// Whether to try the headless browser before plain HTTP
    pub browser_enabled: bool,
    /// Explicit Chromium binary (auto-detected when unset)
    pub chrome_executable: Option<PathBuf>,
    /// Text file with one player name per line, used by the roster endpoint
    pub roster_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_key: String::new(),
            token: String::new(),
            batch_size: MAX_BATCH_SIZE,
            cache_ttl: Duration::from_secs(3600),
            max_pages: 3,
            request_timeout: Duration::from_secs(15),
            browser_enabled: true,
            chrome_executable: None,
            roster_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key-value source. Unset keys fall back to
    /// defaults; set-but-unparseable numbers are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let browser_enabled = match get("CRISTALIX_BROWSER").as_deref().map(str::trim) {
            Some("off") | Some("false") | Some("0") => false,
            // "on" or unset both keep the browser
            _ => true,
        };

        Ok(Self {
            base_url: get("CRISTALIX_BASE_URL").unwrap_or(defaults.base_url),
            project_key: get("CRISTALIX_PROJECT_KEY").unwrap_or_default(),
            token: get("CRISTALIX_TOKEN").unwrap_or_default(),
            batch_size: parse_or(&get, "CRISTALIX_BATCH_SIZE", defaults.batch_size)?
                .clamp(1, MAX_BATCH_SIZE),
            cache_ttl: Duration::from_secs(parse_or(
                &get,
                "CRISTALIX_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            max_pages: parse_or(&get, "CRISTALIX_MAX_PAGES", defaults.max_pages)?.max(1),
            request_timeout: Duration::from_secs(parse_or(
                &get,
                "CRISTALIX_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            browser_enabled,
            chrome_executable: get("CHROME_EXECUTABLE_PATH").map(PathBuf::from),
            roster_path: get("CRISTALIX_ROSTER_PATH").map(PathBuf::from),
        })
    }

    /// Check that the API credentials are configured.
    /// Call this before any operation that talks to the Cristalix API.
    pub fn require_credentials(&self) -> Result<()> {
        if self.project_key.is_empty() {
            anyhow::bail!(
                "CRISTALIX_PROJECT_KEY not set. Add it to your .env file.\n\
                 It identifies your project on the Cristalix open API."
            );
        }
        if self.token.is_empty() {
            anyhow::bail!(
                "CRISTALIX_TOKEN not set. Add it to your .env file.\n\
                 The token is sent as a Bearer authorization header."
            );
        }
        Ok(())
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.base_url, "https://api.cristalix.gg");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_pages, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.browser_enabled);
        assert!(config.roster_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("CRISTALIX_BASE_URL", "http://localhost:9000"),
            ("CRISTALIX_PROJECT_KEY", "key"),
            ("CRISTALIX_TOKEN", "tok"),
            ("CRISTALIX_BATCH_SIZE", "20"),
            ("CRISTALIX_CACHE_TTL_SECS", "60"),
            ("CRISTALIX_MAX_PAGES", "5"),
            ("CRISTALIX_TIMEOUT_SECS", "3"),
            ("CRISTALIX_BROWSER", "off"),
            ("CRISTALIX_ROSTER_PATH", "/data/players.txt"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(!config.browser_enabled);
        assert_eq!(config.roster_path, Some(PathBuf::from("/data/players.txt")));
        assert!(config.require_credentials().is_ok());
    }

    #[test]
    fn test_batch_size_capped_at_upstream_limit() {
        let config = from_pairs(&[("CRISTALIX_BATCH_SIZE", "500")]).unwrap();
        assert_eq!(config.batch_size, 50);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let err = from_pairs(&[("CRISTALIX_MAX_PAGES", "lots")]).unwrap_err();
        assert!(err.to_string().contains("CRISTALIX_MAX_PAGES"));
    }

    #[test]
    fn test_missing_credentials() {
        let config = from_pairs(&[("CRISTALIX_PROJECT_KEY", "key")]).unwrap();
        let err = config.require_credentials().unwrap_err();
        assert!(err.to_string().contains("CRISTALIX_TOKEN"));

        let config = from_pairs(&[]).unwrap();
        let err = config.require_credentials().unwrap_err();
        assert!(err.to_string().contains("CRISTALIX_PROJECT_KEY"));
    }
}
