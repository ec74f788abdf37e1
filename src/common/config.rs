use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::{Deserialize, Serialize};
use tracing::warn;

pub fn config_file() -> PathBuf {
    dirs::home_dir().unwrap().join(".config").join("mosaic").join("config.toml")
}

fn default_store_file() -> PathBuf {
    env::temp_dir().join("mosaic").join("store.json")
}

fn default_fps() -> f64 {
    30.0
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Shared store file joining all processes of this user into one mesh.
    #[serde(default = "default_store_file")]
    pub store_file: PathBuf,
    /// Ticks per second for the update loop.
    #[serde(default = "default_fps")]
    pub fps: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            store_file: default_store_file(),
            fps: default_fps(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
}

impl Config {
    pub fn parse(raw: &str) -> anyhow::Result<Config> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads the config file, falling back to defaults when it is absent or
    /// malformed.
    pub fn load(path: &Path) -> Config {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Config::default(),
        };
        match Config::parse(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!("invalid config at {path:?}, using defaults: {err}");
                Config::default()
            }
        }
    }
}
