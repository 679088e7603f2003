use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    /// RTM auth token for the chat platform.
    rtm_token: String,
    /// User ID of the operator (the bot's "father") who receives forwarded messages.
    operator_uid: String,
    /// Base URL of the RTM HTTP API.
    #[serde(default = "default_api_base")]
    api_base: String,
    /// Completion service endpoint.
    #[serde(default = "default_completion_api_base")]
    completion_api_base: String,
    /// API key for the completion service.
    #[serde(default)]
    completion_api_key: String,
    /// Case-sensitive substring that triggers forwarding from broadcast channels.
    #[serde(default = "default_forward_trigger")]
    forward_trigger: String,
    /// Path of the SQLite store file. Defaults to `<data_dir>/bearybot.db`.
    store_path: Option<String>,
    /// Keep-alive ping interval in seconds.
    #[serde(default = "default_keepalive_secs")]
    keepalive_secs: u64,
    /// Directory for state files (logs, store). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_api_base() -> String {
    "https://api.bearychat.com/v1".to_string()
}

fn default_completion_api_base() -> String {
    "http://www.tuling123.com/openapi/api".to_string()
}

fn default_forward_trigger() -> String {
    "后端".to_string()
}

fn default_keepalive_secs() -> u64 {
    2
}

pub struct Config {
    pub rtm_token: String,
    pub operator_uid: String,
    pub api_base: String,
    pub completion_api_base: String,
    pub completion_api_key: String,
    pub forward_trigger: String,
    pub store_path: PathBuf,
    pub keepalive_secs: u64,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        // Validate required fields
        if file.rtm_token.trim().is_empty() {
            return Err(ConfigError::Validation("rtm_token is required".into()));
        }
        if file.operator_uid.trim().is_empty() {
            return Err(ConfigError::Validation("operator_uid is required".into()));
        }
        if file.forward_trigger.is_empty() {
            return Err(ConfigError::Validation("forward_trigger must not be empty".into()));
        }
        if file.keepalive_secs == 0 {
            return Err(ConfigError::Validation("keepalive_secs must be positive".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let store_path = file
            .store_path
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("bearybot.db"));

        Ok(Self {
            rtm_token: file.rtm_token,
            operator_uid: file.operator_uid,
            api_base: file.api_base.trim_end_matches('/').to_string(),
            completion_api_base: file.completion_api_base,
            completion_api_key: file.completion_api_key,
            forward_trigger: file.forward_trigger,
            store_path,
            keepalive_secs: file.keepalive_secs,
            data_dir,
        })
    }
}
