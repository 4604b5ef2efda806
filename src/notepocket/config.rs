use crate::error::{NotesError, Result};
use crate::store::WritePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Which write policy the durable store runs under.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicyKind {
    #[default]
    WriteThrough,
    Periodic,
}

/// Configuration for notepocket, stored in `<config dir>/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotesConfig {
    #[serde(default)]
    pub write_policy: WritePolicyKind,

    /// Flush period when `write_policy` is `periodic`
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,

    /// Durable image location. The CLI falls back to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_file: Option<PathBuf>,

    /// Legacy key-value file migrated on startup. The CLI falls back to the data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_file: Option<PathBuf>,

    /// Seed a few folders and notes into an empty volatile store on initialize
    #[serde(default)]
    pub seed_demo_data: bool,
}

fn default_autosave_interval() -> u64 {
    DEFAULT_AUTOSAVE_INTERVAL_SECS
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            write_policy: WritePolicyKind::default(),
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            database_file: None,
            legacy_file: None,
            seed_demo_data: false,
        }
    }
}

impl NotesConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: NotesConfig = serde_json::from_str(&content)
            .map_err(|e| NotesError::Config(format!("{}: {}", config_path.display(), e)))?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_dir.join(CONFIG_FILENAME), content)?;
        Ok(())
    }

    pub fn write_policy(&self) -> Result<WritePolicy> {
        match self.write_policy {
            WritePolicyKind::WriteThrough => Ok(WritePolicy::WriteThrough),
            WritePolicyKind::Periodic if self.autosave_interval_secs == 0 => Err(
                NotesError::Config("autosave_interval_secs must be greater than 0".to_string()),
            ),
            WritePolicyKind::Periodic => Ok(WritePolicy::Periodic(Duration::from_secs(
                self.autosave_interval_secs,
            ))),
        }
    }

    pub fn periodic(interval: Duration) -> Self {
        Self {
            write_policy: WritePolicyKind::Periodic,
            autosave_interval_secs: interval.as_secs(),
            ..Self::default()
        }
    }
}
