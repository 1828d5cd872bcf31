//! Client configuration

use crate::error::ClientError;
use crate::session::FileTokenStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides, e.g. `TASKBOARD_BASE_URL`
pub const ENV_PREFIX: &str = "TASKBOARD";

/// Connection and storage settings for the task service client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Origin of the task service API
    pub base_url: String,

    /// Request timeout in seconds (0 disables the timeout)
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Where credentials are persisted; the platform data directory if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
            user_agent: concat!("taskboard/", env!("CARGO_PKG_VERSION")).to_string(),
            token_file: None,
        }
    }
}

impl From<config::ConfigError> for ClientError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl ClientConfig {
    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ClientError> {
        let defaults = Self::default();
        Ok(config::Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("timeout_secs", defaults.timeout_secs)?
            .set_default("user_agent", defaults.user_agent)?)
    }

    /// Load configuration from a TOML or YAML file, then environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let settings = Self::defaults()?
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load configuration with defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> Result<Self, ClientError> {
        let settings = Self::defaults()?
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load `path` when given, environment only otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_env(),
        }
    }

    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }

    /// Token store at the configured location
    pub fn token_store(&self) -> Result<FileTokenStore, ClientError> {
        match &self.token_file {
            Some(path) => Ok(FileTokenStore::new(path)),
            None => FileTokenStore::in_default_location(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert!(config.user_agent.starts_with("taskboard/"));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = ClientConfig {
            timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("taskboard.toml");
        std::fs::write(
            &path,
            "base_url = \"https://tasks.example.com\"\ntoken_file = \"/tmp/tb-tokens.json\"\n",
        )
        .unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.base_url, "https://tasks.example.com");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.token_file, Some(PathBuf::from("/tmp/tb-tokens.json")));
        assert_eq!(
            config.token_store().unwrap().path(),
            Path::new("/tmp/tb-tokens.json")
        );
    }

    #[test]
    fn test_from_file_missing_is_error() {
        let result = ClientConfig::from_file("/nonexistent/taskboard.toml");
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
