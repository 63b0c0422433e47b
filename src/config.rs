use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pathfinder::AgentKind;

const MAX_FRAMES_PER_SECOND: u32 = 1000;

pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to deserialize config: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error("config validation error: {0}")]
    Invalid(String),
}

/// Running options for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub frames_per_second: u32,
    pub lives: u32,
    pub food_target: u32,
    /// Bot to use without asking, when set.
    pub agent_kind: Option<AgentKind>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frames_per_second: 10,
            lives: 5,
            food_target: 10,
            agent_kind: None,
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<(), String> {
        if self.frames_per_second == 0 || self.frames_per_second > MAX_FRAMES_PER_SECOND {
            return Err(format!(
                "frames_per_second must be between 1 and {}",
                MAX_FRAMES_PER_SECOND
            ));
        }
        if self.lives == 0 {
            return Err("lives must be at least 1".to_string());
        }
        if self.food_target == 0 {
            return Err("food_target must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Settings {
    /// Reads settings from a YAML file. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Settings::from_yaml(&content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Settings::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = serde_yaml_ng::from_str(content)?;
        settings.validate().map_err(ConfigError::Invalid)?;
        Ok(settings)
    }
}
