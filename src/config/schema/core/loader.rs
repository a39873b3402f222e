use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let stepgate_dir = home.join(".stepgate");
        let config_path = stepgate_dir.join("config.toml");

        if !stepgate_dir.exists() {
            fs::create_dir_all(&stepgate_dir).context("Failed to create .stepgate directory")?;
            fs::create_dir_all(stepgate_dir.join("plans"))
                .context("Failed to create plans directory")?;
        }

        if config_path.exists() {
            let mut config = Self::load_from(&config_path)?;
            config.state_dir = stepgate_dir.join("plans");
            Ok(config)
        } else {
            let mut config = Self {
                config_path: config_path.clone(),
                state_dir: stepgate_dir.join("plans"),
                ..Self::default()
            };
            config.apply_env_overrides();
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    /// Load a config file without touching the home directory.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(ConfigError::Io)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.config_path = path.to_path_buf();
        if let Some(parent) = path.parent() {
            config.state_dir = parent.join("plans");
        }
        config.apply_env_overrides();
        config
            .validate()
            .map_err(|e| ConfigError::Validation(format!("{e:#}")))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
