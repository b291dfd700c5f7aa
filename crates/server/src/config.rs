use std::path::{Path, PathBuf};

use anyhow::Result;
use slotgate_common::AppConfig;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/slotgate.yaml";

/// Resolved configuration with the path it was read from.
pub struct ServerConfig {
    pub config: AppConfig,
    pub config_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Load from an explicit path. A missing or invalid file is an error.
    pub fn load(path: &str) -> Result<Self> {
        info!(path = path, "loading configuration");
        let config = AppConfig::load(path)?;
        Ok(Self {
            config,
            config_path: Some(PathBuf::from(path)),
        })
    }

    /// Load from the first CLI argument, or from the default path if it
    /// exists. Without either, built-in defaults are used.
    pub fn from_args(arg: Option<String>) -> Result<Self> {
        match arg {
            Some(path) => Self::load(&path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => {
                warn!(path = DEFAULT_CONFIG_PATH, "no configuration file found, using defaults");
                Ok(Self {
                    config: AppConfig::default(),
                    config_path: None,
                })
            }
        }
    }
}
