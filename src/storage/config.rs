//! JSON Configuration Management
//!
//! Handles reading and writing the application configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::AppConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_dir};

/// Configuration service for managing app settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigService {
    /// Load the config at `path` (or the default location), creating a
    /// default file when none exists. Secrets are then filled from the
    /// environment.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            tracing::info!(
                "[Config] No config at {}, writing defaults",
                config_path.display()
            );
            let default_config = AppConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            default_config
        };
        config.apply_env_overrides();

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AppConfig> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &AppConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// Consume the service, keeping only the configuration
    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// Path the configuration was loaded from
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        self.config.apply_env_overrides();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::StreamingPolicy;

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let service = ConfigService::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(service.get_config().command_prefixes, vec!['.']);
        assert_eq!(service.path(), path.as_path());
    }

    #[test]
    fn test_load_existing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"command_prefixes": ["!"], "debug_mode": true, "exec": {"streaming": "Buffered"}}"#,
        )
        .unwrap();

        let config = ConfigService::load(Some(&path)).unwrap().into_config();
        assert_eq!(config.command_prefixes, vec!['!']);
        assert!(config.debug_mode);
        assert_eq!(config.exec.streaming, StreamingPolicy::Buffered);
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"command_prefixes": []}"#).unwrap();

        let result = ConfigService::load(Some(&path));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");
        let mut service = ConfigService::load(Some(&path)).unwrap();

        fs::write(&path, r#"{"ping_url": "http://localhost:1"}"#).unwrap();
        service.reload().unwrap();
        assert_eq!(service.get_config().ping_url, "http://localhost:1");

        service.save().unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("http://localhost:1"));
    }
}
