use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::geocode::kakao::KAKAO_LOCAL_BASE_URL;

pub const KAKAO_API_KEY_ENV: &str = "KAKAO_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub geocode: GeocodeConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("user_data"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocodeConfig {
    pub kakao_api_key: Option<String>,
    /// Minimum spacing between provider calls
    pub interval_ms: u64,
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub kakao_base_url: String,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            kakao_api_key: None,
            interval_ms: 100,
            timeout_secs: 10,
            concurrency: 1,
            kakao_base_url: KAKAO_LOCAL_BASE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load the optional config file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)
                .with_context(|| format!("Config file {}", path.display()))?,
            None => Self::default(),
        };
        config.apply_env(std::env::var(KAKAO_API_KEY_ENV).ok());
        Ok(config)
    }

    fn apply_env(&mut self, kakao_api_key: Option<String>) {
        if let Some(key) = kakao_api_key.filter(|k| !k.trim().is_empty()) {
            self.geocode.kakao_api_key = Some(key);
        }
        if self
            .geocode
            .kakao_api_key
            .as_deref()
            .is_some_and(|k| k.trim().is_empty())
        {
            self.geocode.kakao_api_key = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.server.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.storage.data_dir, PathBuf::from("user_data"));
        assert_eq!(config.geocode.interval_ms, 100);
        assert_eq!(config.geocode.timeout_secs, 10);
        assert_eq!(config.geocode.concurrency, 1);
        assert!(config.geocode.kakao_api_key.is_none());
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:8080"

            [geocode]
            kakao_api_key = "file-key"
            concurrency = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.server.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.geocode.kakao_api_key.as_deref(), Some("file-key"));
        assert_eq!(config.geocode.concurrency, 3);
        assert_eq!(config.geocode.interval_ms, 100);
    }

    #[test]
    fn test_env_overrides_file_key() {
        let mut config = Config::default();
        config.geocode.kakao_api_key = Some("file-key".to_string());

        config.apply_env(Some("env-key".to_string()));
        assert_eq!(config.geocode.kakao_api_key.as_deref(), Some("env-key"));

        config.apply_env(None);
        assert_eq!(config.geocode.kakao_api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_blank_key_is_unset() {
        let mut config = Config::default();
        config.geocode.kakao_api_key = Some("  ".to_string());
        config.apply_env(Some(String::new()));
        assert!(config.geocode.kakao_api_key.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("placemap.toml");
        fs::write(&path, "[storage]\ndata_dir = \"/tmp/places\"\n").unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/places"));
    }
}
