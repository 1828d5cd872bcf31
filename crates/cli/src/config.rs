//! CLI configuration utilities

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taskboard_client::{ClientConfig, FileTokenStore, Gateway, Session};
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "config.toml";
const TOKEN_FILE_NAME: &str = "tokens.json";

/// Resolve the data directory: explicit flag first, then the platform default
pub fn data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    directories::ProjectDirs::from("", "", "taskboard")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("Could not determine a data directory, pass --data-dir")
}

/// Everything a command needs to talk to the service
pub struct Context {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    pub config: ClientConfig,
}

impl Context {
    /// Load configuration from `config_path` (or the data directory default)
    /// and apply the `--base-url` override
    pub fn load(
        data_dir: PathBuf,
        config_path: Option<PathBuf>,
        base_url: Option<String>,
    ) -> Result<Self> {
        let explicit = config_path.is_some();
        let config_path = config_path.unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));

        let mut config = if explicit || config_path.exists() {
            info!("Loading configuration from: {}", config_path.display());
            ClientConfig::from_file(&config_path)?
        } else {
            debug!("Using default configuration with environment overrides");
            ClientConfig::from_env()?
        };

        if let Some(url) = base_url {
            config.base_url = url;
        }
        if config.token_file.is_none() {
            config.token_file = Some(data_dir.join(TOKEN_FILE_NAME));
        }

        Ok(Self {
            data_dir,
            config_path,
            config,
        })
    }

    /// Gateway backed by the persisted credentials
    pub fn gateway(&self) -> Result<Gateway> {
        let store = self.config.token_store()?;
        debug!("Using credentials at {}", store.path().display());
        let session = Arc::new(Session::new(Arc::new(store)));
        Ok(Gateway::from_config(&self.config, session)?)
    }

    pub fn token_store(&self) -> Result<FileTokenStore> {
        Ok(self.config.token_store()?)
    }
}

/// Write `config` as TOML
pub fn save_config<P: AsRef<Path>>(config: &ClientConfig, path: P) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P, base_url: Option<String>) -> Result<()> {
    let mut config = ClientConfig::default();
    if let Some(url) = base_url {
        config.base_url = url;
    }
    save_config(&config, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_config_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        generate_default_config(&path, Some("https://tasks.example.com".into())).unwrap();

        let context = Context::load(dir.path().to_path_buf(), None, None).unwrap();
        assert_eq!(context.config.base_url, "https://tasks.example.com");
        assert_eq!(
            context.config.token_file.as_deref(),
            Some(dir.path().join(TOKEN_FILE_NAME).as_path())
        );
    }

    #[test]
    fn test_base_url_flag_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        generate_default_config(&path, None).unwrap();

        let context = Context::load(
            dir.path().to_path_buf(),
            Some(path.clone()),
            Some("http://localhost:9000".into()),
        )
        .unwrap();
        assert_eq!(context.config.base_url, "http://localhost:9000");
        assert_eq!(context.config_path, path);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = Context::load(
            dir.path().to_path_buf(),
            Some(dir.path().join("absent.toml")),
            None,
        );
        assert!(result.is_err());
    }
}
