use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::monitor::MonitorConfig;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const DEFAULT_APP_PROCESS: &str = "EcoPaste";
const APP_BUNDLE_ID: &str = "com.ayangweb.EcoPaste";
/// Release builds write the first name, development builds the second.
const DATABASE_CANDIDATES: [&str; 2] = ["EcoPaste.db", "EcoPaste.dev.db"];
const IMAGES_SUBDIR: &str = "images";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Application data directory; defaults to the macOS Application Support
    /// folder of the monitored app.
    pub data_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub images_dir: Option<PathBuf>,
    pub app_process_name: String,
    pub monitor: MonitorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_path: None,
            images_dir: None,
            app_process_name: DEFAULT_APP_PROCESS.into(),
            monitor: MonitorConfig::default(),
        }
    }
}

/// Concrete locations the probes read from.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPaths {
    pub database: PathBuf,
    pub images: PathBuf,
}

impl Settings {
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let home = env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join(APP_BUNDLE_ID))
    }

    pub fn resolve_paths(&self) -> Result<ResolvedPaths> {
        let database = match &self.database_path {
            Some(path) => path.clone(),
            None => pick_database(&self.data_dir()?),
        };
        let images = match &self.images_dir {
            Some(path) => path.clone(),
            None => self.data_dir()?.join(IMAGES_SUBDIR),
        };
        Ok(ResolvedPaths { database, images })
    }
}

/// First existing candidate, or the release name when none exists yet.
fn pick_database(data_dir: &Path) -> PathBuf {
    DATABASE_CANDIDATES
        .iter()
        .map(|name| data_dir.join(name))
        .find(|path| path.exists())
        .unwrap_or_else(|| data_dir.join(DATABASE_CANDIDATES[0]))
}

/// Default settings file: `$XDG_CONFIG_HOME/pastewatch/settings.json` or
/// `~/.config/pastewatch/settings.json`.
pub fn default_settings_path() -> Option<PathBuf> {
    env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|base| base.join("pastewatch").join("settings.json"))
}

pub struct SettingsStore {
    path: PathBuf,
    data: Settings,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(err) => {
                    log_warn!(
                        "ignoring unreadable settings {}: {err}; using defaults",
                        path.display()
                    );
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.data
    }

    pub fn update(&mut self, settings: Settings) -> Result<()> {
        self.data = settings;
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
