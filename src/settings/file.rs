use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use directories::ProjectDirs;

use super::{SettingChange, Settings, SettingsPatch, SettingsStore, Watchers};
use crate::error::StoreError;

/// Settings persisted as a single JSON document.
pub struct JsonFileStore {
    path: PathBuf,
    watchers: Watchers,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            watchers: Watchers::default(),
        }
    }

    /// `<data dir>/webpet/settings.json`, if the platform has a data dir.
    pub fn default_path() -> Option<PathBuf> {
        let proj = ProjectDirs::from("com", "webpet", "WebPet")?;
        Some(proj.data_local_dir().join("settings.json"))
    }

    fn read(&self) -> Result<Settings, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, settings: &Settings) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&tmp, data)?;
        // rename over an existing file is atomic on the same filesystem (unix)
        #[cfg(windows)]
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self) -> Result<Settings, StoreError> {
        self.read()
    }

    fn set(&self, patch: &SettingsPatch) -> Result<(), StoreError> {
        // A corrupt document must not block every later write.
        let mut current = self.read().unwrap_or_else(|e| {
            log::warn!("Discarding unreadable settings at {}: {e}", self.path.display());
            Settings::default()
        });
        let changes: Vec<SettingChange> = patch.diff(&current);
        patch.apply(&mut current);
        self.write_atomic(&current)?;
        self.watchers.notify(changes);
        Ok(())
    }

    fn subscribe(&self) -> Receiver<Vec<SettingChange>> {
        self.watchers.subscribe()
    }
}
