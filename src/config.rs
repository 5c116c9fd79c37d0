use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_user")]
    pub default_user: String,

    #[serde(default)]
    pub default_tags: Vec<String>,

    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("linkstash");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("links.db").to_string_lossy().to_string()
}

fn default_user() -> String {
    "default".to_string()
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            default_user: default_user(),
            default_tags: Vec::new(),
            page_size: default_page_size(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        // Environment override, handy for scripts and throwaway databases.
        if let Ok(db_path) = std::env::var("LINKSTASH_DB") {
            config.db_path = db_path;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkstash")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_a_round_trip() {
        let config = Config::default();
        assert!(!config.db_path.is_empty());
        assert_eq!(config.default_user, "default");
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.default_user, config.default_user);
        assert_eq!(parsed.page_size, config.page_size);
        assert!(parsed.default_tags.is_empty());
    }
}
