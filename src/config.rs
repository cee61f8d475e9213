use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::EngineSettings;
use crate::world::SpawnSpec;

fn default_server_url() -> String {
    "ws://localhost:12345/".to_string()
}

fn default_spawn() -> SpawnSpec {
    SpawnSpec::circle(400.0, 50.0, 20.0)
}

fn default_local_player() -> Option<SpawnSpec> {
    Some(SpawnSpec::polygon(400.0, 200.0, 5, 20.0))
}

fn default_tick_hz() -> u32 {
    60
}

fn default_frame_log_interval() -> u64 {
    120
}

fn default_queue_capacity() -> usize {
    100
}

fn default_max_count() -> usize {
    10_000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    12345
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default = "default_spawn")]
    pub spawn: SpawnSpec,
    /// Body for this client's own player, created before any server count
    /// arrives. `null` starts with an empty pool.
    #[serde(default = "default_local_player")]
    pub local_player: Option<SpawnSpec>,
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default = "default_frame_log_interval")]
    pub frame_log_interval: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Largest count the client will reconcile to; bigger ones are dropped.
    #[serde(default = "default_max_count")]
    pub max_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            listen: ListenConfig::default(),
            spawn: default_spawn(),
            local_player: default_local_player(),
            tick_hz: default_tick_hz(),
            frame_log_interval: default_frame_log_interval(),
            queue_capacity: default_queue_capacity(),
            max_count: default_max_count(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_hz == 0 {
            return Err(ConfigError::Validation(
                "tick_hz must be greater than zero".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "queue_capacity must be greater than zero".into(),
            ));
        }
        if self.local_player.is_some() && self.max_count == 0 {
            return Err(ConfigError::Validation(
                "max_count must leave room for the local player".into(),
            ));
        }
        if self.spawn.shape.is_degenerate() {
            return Err(ConfigError::Validation(format!(
                "spawn shape {:?} has no area",
                self.spawn.shape
            )));
        }
        if let Some(player) = &self.local_player {
            if player.shape.is_degenerate() {
                return Err(ConfigError::Validation(format!(
                    "local_player shape {:?} has no area",
                    player.shape
                )));
            }
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            tick_hz: self.tick_hz,
            frame_log_interval: self.frame_log_interval,
        }
    }
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Config> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Shape;

    #[test]
    fn empty_document_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server_url, "ws://localhost:12345/");
        assert_eq!(config.listen.port, 12345);
        assert_eq!(config.max_count, 10_000);
        config.validate().unwrap();
    }

    #[test]
    fn shapes_are_tagged_by_kind() {
        let config: Config = serde_yaml::from_str(
            r#"
spawn:
  shape: { kind: rectangle, width: 30, height: 10 }
  x: 100
  y: 20
local_player: null
"#,
        )
        .unwrap();
        assert_eq!(
            config.spawn.shape,
            Shape::Rectangle {
                width: 30.0,
                height: 10.0
            }
        );
        assert_eq!(config.local_player, None);
    }

    #[test]
    fn validation_catches_zero_rates() {
        let config = Config {
            tick_hz: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            queue_capacity: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            max_count: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        let config = Config {
            max_count: 0,
            local_player: None,
            ..Config::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn validation_catches_degenerate_spawns() {
        let config = Config {
            spawn: SpawnSpec::circle(0.0, 0.0, 0.0),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("spawn shape"));
    }
}
