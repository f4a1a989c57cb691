use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use shared::{domain::Theme, protocol::LoggingConfig};
use tracing::{debug, warn};

use crate::error::PreferenceError;

pub const THEME_KEY: &str = "theme";
pub const LOGGING_CONFIG_KEY: &str = "logging_config";

/// Small string key-value store persisted as a JSON object.
#[derive(Debug, Clone)]
pub struct Preferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl Preferences {
    /// `<config dir>/scion-dashboard/preferences.json`
    pub fn default_path() -> Result<PathBuf, PreferenceError> {
        let base = dirs::config_dir().ok_or(PreferenceError::NoConfigDir)?;
        Ok(base.join("scion-dashboard").join("preferences.json"))
    }

    /// Missing or unreadable files load as an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<BTreeMap<String, String>>(&raw).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "prefs: ignoring corrupt preference file");
                BTreeMap::new()
            }),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "prefs: starting empty");
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), PreferenceError> {
        self.values.insert(key.into(), value.into());
        self.save()
    }

    pub fn remove(&mut self, key: &str) -> Result<(), PreferenceError> {
        if self.values.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    pub fn theme(&self) -> Theme {
        self.get(THEME_KEY)
            .and_then(|raw| raw.parse::<Theme>().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), PreferenceError> {
        self.set(THEME_KEY, theme.to_string())
    }

    pub fn cached_logging_config(&self) -> Option<LoggingConfig> {
        let raw = self.get(LOGGING_CONFIG_KEY)?;
        serde_json::from_str(raw).ok()
    }

    pub fn cache_logging_config(&mut self, config: &LoggingConfig) -> Result<(), PreferenceError> {
        let raw = serde_json::to_string(config)?;
        self.set(LOGGING_CONFIG_KEY, raw)
    }

    fn save(&self) -> Result<(), PreferenceError> {
        let write_err = |source| PreferenceError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let raw = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, raw).map_err(write_err)
    }
}

#[cfg(test)]
#[path = "tests/prefs_tests.rs"]
mod tests;
