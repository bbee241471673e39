//! Configuration management for Syndicast
//!
//! Configuration is a single TOML file. Only `[database]` is required; every
//! other section has defaults.
//!
//! ```toml
//! [database]
//! path = "~/.local/share/syndicast/syndicast.db"
//!
//! [credentials]
//! storage = "file"          # or "keyring"
//! path = "~/.config/syndicast/credentials.toml"
//!
//! [http]
//! timeout_secs = 30
//!
//! [platforms.twitter]
//! calls_per_minute = 100
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,

    #[serde(default)]
    pub credentials: CredentialConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// Per-platform overrides keyed by lowercase platform name
    #[serde(default)]
    pub platforms: HashMap<String, PlatformConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Where per-account credential bundles live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// TOML file with one table per account id
    #[default]
    File,
    /// OS keyring, one JSON bundle per account id
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialConfig {
    #[serde(default)]
    pub storage: StorageBackend,

    /// Path of the credentials file (file backend only)
    #[serde(default = "default_credentials_path")]
    pub path: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::File,
            path: default_credentials_path(),
        }
    }
}

impl CredentialConfig {
    pub fn expand_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

fn default_credentials_path() -> String {
    "~/.config/syndicast/credentials.toml".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("syndicast/{}", env!("CARGO_PKG_VERSION"))
}

/// Overrides for one platform. Unset fields fall back to the adapter's defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlatformConfig {
    pub calls_per_minute: Option<u32>,
    pub base_url: Option<String>,
}

impl PlatformConfig {
    pub fn calls_per_minute_or(&self, default: u32) -> u32 {
        self.calls_per_minute.unwrap_or(default)
    }

    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| default.to_string())
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/syndicast/syndicast.db".to_string(),
            },
            credentials: CredentialConfig::default(),
            http: HttpConfig::default(),
            platforms: HashMap::new(),
        }
    }

    /// Overrides for `platform`, or defaults if none are configured
    pub fn platform(&self, platform: &str) -> PlatformConfig {
        self.platforms
            .get(&platform.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        if self.http.timeout_secs == 0 {
            return Err(
                ConfigError::InvalidValue("http.timeout_secs must be greater than 0".to_string())
                    .into(),
            );
        }
        for (name, platform) in &self.platforms {
            if platform.calls_per_minute == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "platforms.{}.calls_per_minute must be greater than 0",
                    name
                ))
                .into());
            }
        }
        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNDICAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("syndicast").join("config.toml"))
}

/// Resolve the database path: explicit override, then `SYNDICAST_DB_PATH`,
/// then the configured path
pub fn resolve_db_path(config: &Config, override_path: Option<&str>) -> String {
    if let Some(path) = override_path {
        return path.to_string();
    }
    if let Ok(path) = std::env::var("SYNDICAST_DB_PATH") {
        if !path.is_empty() {
            return path;
        }
    }
    config.database.path.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse("[database]\npath = \"/tmp/s.db\"\n").unwrap();

        assert_eq!(config.database.path, "/tmp/s.db");
        assert_eq!(config.credentials.storage, StorageBackend::File);
        assert_eq!(config.http.timeout_secs, 30);
        assert!(config.http.user_agent.starts_with("syndicast/"));
        assert!(config.platforms.is_empty());
    }

    #[test]
    fn test_platform_overrides() {
        let config = Config::parse(
            r#"
[database]
path = "/tmp/s.db"

[credentials]
storage = "keyring"

[platforms.twitter]
calls_per_minute = 100

[platforms.facebook]
base_url = "http://localhost:9000/v18.0"
"#,
        )
        .unwrap();

        assert_eq!(config.credentials.storage, StorageBackend::Keyring);
        assert_eq!(config.platform("twitter").calls_per_minute_or(300), 100);
        assert_eq!(config.platform("Twitter").calls_per_minute_or(300), 100);
        assert_eq!(
            config.platform("facebook").base_url_or("https://graph.facebook.com/v18.0"),
            "http://localhost:9000/v18.0"
        );
        assert_eq!(config.platform("linkedin"), PlatformConfig::default());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let result = Config::parse(
            "[database]\npath = \"/tmp/s.db\"\n[platforms.linkedin]\ncalls_per_minute = 0\n",
        );
        assert!(matches!(
            result,
            Err(crate::error::SyndicastError::Config(ConfigError::InvalidValue(_)))
        ));
    }

    #[test]
    fn test_missing_database_section_is_parse_error() {
        let result = Config::parse("[http]\ntimeout_secs = 5\n");
        assert!(matches!(
            result,
            Err(crate::error::SyndicastError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_load_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[database]\npath = \"~/x.db\"\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.database.path, "~/x.db");
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load_from_path(&temp_dir.path().join("absent.toml"));
        assert!(matches!(
            result,
            Err(crate::error::SyndicastError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_env_override() {
        std::env::set_var("SYNDICAST_CONFIG", "/tmp/custom/config.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("SYNDICAST_CONFIG");

        assert_eq!(path, PathBuf::from("/tmp/custom/config.toml"));
    }

    #[test]
    #[serial]
    fn test_resolve_db_path_precedence() {
        let config = Config::default_config();

        std::env::remove_var("SYNDICAST_DB_PATH");
        assert_eq!(resolve_db_path(&config, None), config.database.path);

        std::env::set_var("SYNDICAST_DB_PATH", "/tmp/env.db");
        assert_eq!(resolve_db_path(&config, None), "/tmp/env.db");
        assert_eq!(resolve_db_path(&config, Some("/tmp/cli.db")), "/tmp/cli.db");
        std::env::remove_var("SYNDICAST_DB_PATH");
    }
}
