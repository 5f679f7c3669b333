// File: src/config.rs
use crate::paths::AppPaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    /// API base, e.g. "https://lab.example.com/api". Endpoint paths are appended.
    pub url: String,

    /// Last username that logged in, pre-filled on the login prompt.
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub allow_insecure_certs: bool,

    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Page size sent as `per_page`. The server default applies when unset.
    #[serde(default)]
    pub per_page: Option<u32>,

    #[serde(default = "default_true")]
    pub cache_addresses: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            allow_insecure_certs: false,
            request_timeout_secs: default_timeout(),
            per_page: None,
            cache_addresses: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = AppPaths::get_config_file_path()?;
        if path.exists() {
            return Self::load_from(&path);
        }
        Err(anyhow::anyhow!("Config file not found"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::get_config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get_path_string() -> Result<String> {
        let path = AppPaths::get_config_file_path()?;
        Ok(path.to_string_lossy().to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let cfg: Config = toml::from_str("url = \"https://lab.example.com/api\"").unwrap();
        assert_eq!(cfg.url, "https://lab.example.com/api");
        assert!(cfg.username.is_empty());
        assert!(!cfg.allow_insecure_certs);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.per_page, None);
        assert!(cfg.cache_addresses);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config {
            url: "http://127.0.0.1:8000/api".to_string(),
            username: "cashier1".to_string(),
            per_page: Some(25),
            ..Config::default()
        };
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.username, "cashier1");
        assert_eq!(loaded.per_page, Some(25));
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let cfg = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(cfg.request_timeout(), Duration::from_secs(1));
    }
}
