//! Configuration parsing for the exchange daemon.
//!
//! Plain `key=value` lines with `#` comments and optional quotes.
//! Precedence: CLI flags > `--config` file > `.xchange/config` > defaults.

use crate::types::SortMode;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Project-local config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".xchange/config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid boolean value for {key}: {value}")]
    InvalidBool { key: String, value: String },
    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },
}

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP port on 127.0.0.1.
    pub port: u16,
    /// Bearer token required by the HTTP API, if set.
    pub auth_token: Option<String>,

    // Discovery
    /// Sort mode used when a request does not name one.
    pub default_sort: SortMode,
    /// Maximum listings per response (0 = unlimited).
    pub page_size: usize,

    // Tagging
    pub tagging_enabled: bool,
    pub tagging_timeout_ms: u64,
    /// Maximum tags kept per listing (0 = unlimited).
    pub max_tags: usize,

    /// Load the demonstration listings and session on start.
    pub seed_demo_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 7800,
            auth_token: None,
            default_sort: SortMode::Recent,
            page_size: 0,
            tagging_enabled: true,
            tagging_timeout_ms: 2000,
            max_tags: 5,
            seed_demo_data: true,
        }
    }
}

impl Config {
    /// Load config from a file, merging with defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.load_file(path)?;
        Ok(config)
    }

    /// Defaults merged with `.xchange/config` under `root`, if present.
    pub fn from_workspace(root: &Path) -> Result<Self, ConfigError> {
        let path: PathBuf = root.join(DEFAULT_CONFIG_PATH);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and merge values from a config file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    /// Parse config content (key=value format).
    fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };

            let key = key.trim();
            let value = Self::unquote(value.trim());

            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    /// Remove surrounding quotes from a value.
    fn unquote(value: &str) -> String {
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            return value[1..value.len() - 1].to_string();
        }
        value.to_string()
    }

    /// Apply a single config value.
    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "port" => self.port = Self::parse_int(key, value)?,
            "auth_token" => {
                self.auth_token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "default_sort" => {
                self.default_sort = value
                    .parse()
                    .map_err(|e: crate::types::ParseEnumError| {
                        ConfigError::InvalidLine(format!("default_sort: {e}"))
                    })?;
            }
            "page_size" => self.page_size = Self::parse_int(key, value)?,
            "tagging_enabled" => self.tagging_enabled = Self::parse_bool(key, value)?,
            "tagging_timeout_ms" => self.tagging_timeout_ms = Self::parse_int(key, value)?,
            "max_tags" => self.max_tags = Self::parse_int(key, value)?,
            "seed_demo_data" => self.seed_demo_data = Self::parse_bool(key, value)?,
            _ => {
                // Unknown keys warn but don't fail.
                eprintln!("Warning: unknown config key: {key}");
            }
        }
        Ok(())
    }

    fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidInt {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Parse a boolean value.
    fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" => Ok(true),
            "false" | "0" | "no" | "n" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.port, 7800);
        assert!(config.auth_token.is_none());
        assert_eq!(config.default_sort, SortMode::Recent);
        assert_eq!(config.page_size, 0);
        assert!(config.tagging_enabled);
        assert_eq!(config.tagging_timeout_ms, 2000);
        assert_eq!(config.max_tags, 5);
        assert!(config.seed_demo_data);
    }

    #[test]
    fn parse_simple_config() {
        let mut config = Config::default();
        let content = r#"
# local overrides
port=9100
default_sort="reputation"
tagging_enabled=off
max_tags=3
auth_token='s3cret'
"#;
        config.parse_content(content).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.default_sort, SortMode::Reputation);
        assert!(!config.tagging_enabled);
        assert_eq!(config.max_tags, 3);
        assert_eq!(config.auth_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn empty_auth_token_clears_it() {
        let mut config = Config {
            auth_token: Some("old".to_string()),
            ..Config::default()
        };
        config.parse_content("auth_token=").unwrap();
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();
        assert!(matches!(
            config.parse_content("port=eighty"),
            Err(ConfigError::InvalidInt { .. })
        ));
        assert!(matches!(
            config.parse_content("seed_demo_data=maybe"),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(matches!(
            config.parse_content("default_sort=popular"),
            Err(ConfigError::InvalidLine(_))
        ));
        assert!(matches!(
            config.parse_content("no equals sign"),
            Err(ConfigError::InvalidLine(_))
        ));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut config = Config::default();
        config.parse_content("theme=dark\nport=7801").unwrap();
        assert_eq!(config.port, 7801);
    }

    #[test]
    fn unquote_removes_quotes() {
        assert_eq!(Config::unquote("\"hello\""), "hello");
        assert_eq!(Config::unquote("'world'"), "world");
        assert_eq!(Config::unquote("noquotes"), "noquotes");
        assert_eq!(Config::unquote("\""), "\"");
    }

    #[test]
    fn workspace_config_is_optional() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::from_workspace(dir.path()).unwrap(), Config::default());

        std::fs::create_dir_all(dir.path().join(".xchange")).unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_PATH),
            "page_size=20\nseed_demo_data=false\n",
        )
        .unwrap();
        let config = Config::from_workspace(dir.path()).unwrap();
        assert_eq!(config.page_size, 20);
        assert!(!config.seed_demo_data);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = Config::from_file(&dir.path().join("nope"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }
}
