//! Client configuration.
//!
//! Two layers: the backend endpoint (URL + publishable anon key) comes from
//! the environment, matching how deployments are provisioned; persisted
//! preferences (last signed-in email) live in a JSON file under the
//! platform config directory.
//!
//! Configuration is stored at `~/.config/agenthub/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "agenthub";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable naming the backend base URL
const ENV_URL: &str = "AGENTHUB_URL";

/// Environment variable naming the publishable anon key
const ENV_ANON_KEY: &str = "AGENTHUB_ANON_KEY";

/// Endpoint of the hosted backend this client talks to.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

impl BackendConfig {
    /// Read the backend endpoint from the environment, loading a `.env`
    /// file first when present. Both variables are required.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let url = std::env::var(ENV_URL)
            .with_context(|| format!("{ENV_URL} is not set"))?;
        let anon_key = std::env::var(ENV_ANON_KEY)
            .with_context(|| format!("{ENV_ANON_KEY} is not set"))?;
        Ok(Self { url, anon_key })
    }

    /// Cache directory for this backend. Scoped by host so two deployments
    /// never share a session file.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(host_slug(&self.url)))
    }
}

/// Reduce a backend URL to a directory-safe slug
fn host_slug(url: &str) -> String {
    let stripped = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    stripped
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_slug_strips_scheme_and_sanitizes() {
        assert_eq!(
            host_slug("https://example.agenthub.dev"),
            "example.agenthub.dev"
        );
        assert_eq!(
            host_slug("https://abcd1234.backend.co/"),
            "abcd1234.backend.co"
        );
        assert_eq!(host_slug("http://localhost:54321"), "localhost_54321");
    }

    #[test]
    fn test_config_defaults_to_empty() {
        let config: Config = serde_json::from_str("{}").expect("parse empty config");
        assert!(config.last_email.is_none());
    }

    #[test]
    fn test_config_round_trips() {
        let config = Config {
            last_email: Some("user@example.com".to_string()),
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: Config = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.last_email.as_deref(), Some("user@example.com"));
    }
}
