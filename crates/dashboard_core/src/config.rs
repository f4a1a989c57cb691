use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use url::Url;

use crate::{
    error::ConfigError,
    transport::{ReconnectPolicy, DEFAULT_CHANNEL_PATH},
};

pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub channel_path: String,
    pub debug_mode: bool,
    pub fallback_after_errors: u32,
    pub reconnect_delay_ms: u64,
    pub reconnect_delay_max_ms: u64,
    pub fallback_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub file_request_timeout_secs: u64,
    pub preferences_path: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".into(),
            channel_path: DEFAULT_CHANNEL_PATH.into(),
            debug_mode: false,
            fallback_after_errors: 3,
            reconnect_delay_ms: 1000,
            reconnect_delay_max_ms: 5000,
            fallback_delay_ms: 1000,
            poll_interval_ms: 2000,
            file_request_timeout_secs: 10,
            preferences_path: None,
            log_filter: "info".into(),
        }
    }
}

/// Every key optional; present keys override the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    server_url: Option<String>,
    channel_path: Option<String>,
    debug_mode: Option<bool>,
    fallback_after_errors: Option<u32>,
    reconnect_delay_ms: Option<u64>,
    reconnect_delay_max_ms: Option<u64>,
    fallback_delay_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    file_request_timeout_secs: Option<u64>,
    preferences_path: Option<PathBuf>,
    log_filter: Option<String>,
}

impl Settings {
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::ServerUrl {
            value: self.server_url.clone(),
            reason,
        };
        let url = Url::parse(self.server_url.trim()).map_err(|err| invalid(err.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            fallback_after_errors: self.fallback_after_errors.max(1),
            base_delay: Duration::from_millis(self.reconnect_delay_ms),
            max_delay: Duration::from_millis(self.reconnect_delay_max_ms.max(self.reconnect_delay_ms)),
            fallback_delay: Duration::from_millis(self.fallback_delay_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn file_request_timeout(&self) -> Duration {
        Duration::from_secs(self.file_request_timeout_secs.max(1))
    }

    fn merge_file(&mut self, file: FileSettings) {
        if let Some(v) = file.server_url {
            self.server_url = v;
        }
        if let Some(v) = file.channel_path {
            self.channel_path = v;
        }
        if let Some(v) = file.debug_mode {
            self.debug_mode = v;
        }
        if let Some(v) = file.fallback_after_errors {
            self.fallback_after_errors = v;
        }
        if let Some(v) = file.reconnect_delay_ms {
            self.reconnect_delay_ms = v;
        }
        if let Some(v) = file.reconnect_delay_max_ms {
            self.reconnect_delay_max_ms = v;
        }
        if let Some(v) = file.fallback_delay_ms {
            self.fallback_delay_ms = v;
        }
        if let Some(v) = file.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = file.file_request_timeout_secs {
            self.file_request_timeout_secs = v;
        }
        if file.preferences_path.is_some() {
            self.preferences_path = file.preferences_path;
        }
        if let Some(v) = file.log_filter {
            self.log_filter = v;
        }
    }

    /// Applies `APP__*` overrides read through `var`. Unparseable numbers
    /// leave the current value in place.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = var("DASHBOARD_SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = var("APP__SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = var("APP__CHANNEL_PATH") {
            self.channel_path = v;
        }
        if let Some(v) = var("APP__DEBUG_MODE") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.debug_mode = true,
                "0" | "false" | "no" | "off" => self.debug_mode = false,
                _ => {}
            }
        }
        parse_into(&var, "APP__FALLBACK_AFTER_ERRORS", &mut self.fallback_after_errors);
        parse_into(&var, "APP__RECONNECT_DELAY_MS", &mut self.reconnect_delay_ms);
        parse_into(&var, "APP__RECONNECT_DELAY_MAX_MS", &mut self.reconnect_delay_max_ms);
        parse_into(&var, "APP__FALLBACK_DELAY_MS", &mut self.fallback_delay_ms);
        parse_into(&var, "APP__POLL_INTERVAL_MS", &mut self.poll_interval_ms);
        parse_into(
            &var,
            "APP__FILE_REQUEST_TIMEOUT_SECS",
            &mut self.file_request_timeout_secs,
        );
        if let Some(v) = var("APP__PREFERENCES_PATH") {
            self.preferences_path = Some(PathBuf::from(v));
        }
        if let Some(v) = var("APP__LOG_FILTER") {
            self.log_filter = v;
        }
    }
}

fn parse_into<F, T>(var: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(parsed) = var(key).and_then(|raw| raw.trim().parse::<T>().ok()) {
        *slot = parsed;
    }
}

/// Defaults, then `path` (or `dashboard.toml` in the working directory) when
/// it exists, then the process environment.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => {
            let file: FileSettings = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            settings.merge_file(file);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }
    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
