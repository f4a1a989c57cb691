use std::path::PathBuf;

use shared::error::{ApiError, ErrorCode, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("controller rejected request: {0}")]
    Rejected(ApiError),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("channel unavailable: {0}")]
    Channel(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        ClientError::Rejected(ApiError::new(code, message))
    }

    /// Message suitable for a transient user notification.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Rejected(api) => api.message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid server_url '{value}': {reason}")]
    ServerUrl { value: String, reason: String },
}

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("no configuration directory available")]
    NoConfigDir,
    #[error("failed writing preferences to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed encoding preferences: {0}")]
    Encode(#[from] serde_json::Error),
}
