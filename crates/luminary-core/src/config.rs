//! Application configuration management.
//!
//! Configuration covers the backend endpoint, the app-shell manifest the
//! edge cache precaches, and the cache partition version. Bumping
//! `cache_version` is the only way existing partitions get invalidated:
//! activation deletes every partition whose name no longer matches.
//!
//! Configuration is stored at `~/.config/luminary/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data/cache directory paths
const APP_NAME: &str = "luminary";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Prefix for the versioned static (app shell) cache partition
const STATIC_PARTITION_PREFIX: &str = "luminary-study";

/// Prefix for the pinned offline-content cache partition
const OFFLINE_PARTITION_PREFIX: &str = "luminary-offline";

/// Backend API path prefixes the edge cache must never intercept.
/// Caching these would serve stale or cross-user data.
pub const API_PASSTHROUGH_PREFIXES: &[&str] =
    &["/rest/v1", "/auth/v1", "/functions/v1", "/storage/v1"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backend_url: String,
    pub api_key: String,
    /// Web origin the edge cache resolves path-only URLs against.
    pub app_origin: String,
    /// Shell URLs precached at install. Install fails if any is unreachable.
    pub shell_manifest: Vec<String>,
    /// Version suffix for the cache partitions.
    pub cache_version: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            app_origin: "http://localhost:3000".to_string(),
            shell_manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
                "/offline.html".to_string(),
                "/icons/icon-192.png".to_string(),
                "/icons/icon-512.png".to_string(),
            ],
            cache_version: 1,
        }
    }
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

    /// Directory for the edge cache partitions.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Directory for the durable store and session file.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Name of the current static partition, e.g. `luminary-study-v1`.
    pub fn static_partition_name(&self) -> String {
        format!("{}-v{}", STATIC_PARTITION_PREFIX, self.cache_version)
    }

    /// Name of the current offline-content partition, e.g. `luminary-offline-v1`.
    pub fn offline_partition_name(&self) -> String {
        format!("{}-v{}", OFFLINE_PARTITION_PREFIX, self.cache_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_names_follow_version() {
        let mut config = Config::default();
        assert_eq!(config.static_partition_name(), "luminary-study-v1");
        assert_eq!(config.offline_partition_name(), "luminary-offline-v1");

        config.cache_version = 2;
        assert_eq!(config.static_partition_name(), "luminary-study-v2");
    }
}
