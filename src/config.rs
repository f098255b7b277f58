//! Configuration loading and management
//!
//! Handles parsing of `.hk.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage::DEFAULT_WATCH_DEBOUNCE_MS;

pub const CONFIG_FILE: &str = ".hk.toml";

const MAX_DEBOUNCE_MS: u64 = 10_000;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Task collection behaviour
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Change feed tuning
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store directory. Relative paths resolve against the config file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Replicate every task write to the legacy key
    #[serde(default = "default_true")]
    pub mirror_legacy: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            mirror_legacy: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Window for coalescing file events into one change
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_WATCH_DEBOUNCE_MS
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a `.hk.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.validate()?;
        if let (Some(dir), Some(base)) = (config.store.dir.as_ref(), path.parent()) {
            if dir.is_relative() {
                config.store.dir = Some(base.join(dir));
            }
        }
        Ok(config)
    }

    /// Load `.hk.toml` from `dir`, or return defaults when there is none
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Store directory: explicit override, then config, then the platform
    /// data directory.
    pub fn store_dir(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = explicit {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = &self.store.dir {
            return Ok(dir.clone());
        }
        directories::ProjectDirs::from("", "", "hk")
            .map(|dirs| dirs.data_dir().join("store"))
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "no store directory: pass --store, set HK_STORE, or set store.dir".to_string(),
                )
            })
    }

    fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.store.dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::InvalidConfig("store.dir cannot be empty".to_string()));
            }
        }
        if self.watch.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(Error::InvalidConfig(format!(
                "watch.debounce_ms must be <= {MAX_DEBOUNCE_MS}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from_dir(dir.path()).expect("defaults");
        assert!(cfg.tasks.mirror_legacy);
        assert_eq!(cfg.watch.debounce_ms, DEFAULT_WATCH_DEBOUNCE_MS);
        assert!(cfg.store.dir.is_none());
    }

    #[test]
    fn relative_store_dir_resolves_against_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let content = r#"
[store]
dir = "state"

[tasks]
mirror_legacy = false
"#;
        fs::write(dir.path().join(CONFIG_FILE), content.trim()).expect("write config");

        let cfg = Config::load_from_dir(dir.path()).expect("load");
        assert!(!cfg.tasks.mirror_legacy);
        assert_eq!(cfg.store_dir(None).unwrap(), dir.path().join("state"));
        assert_eq!(
            cfg.store_dir(Some(Path::new("/elsewhere"))).unwrap(),
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn oversized_debounce_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[watch]\ndebounce_ms = 60000").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        match err {
            Error::InvalidConfig(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn save_writes_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.toml");
        Config::default().save(&path).expect("save config");

        let written = fs::read_to_string(&path).expect("read config");
        assert!(written.contains("mirror_legacy = true"));
    }
}
