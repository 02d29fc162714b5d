use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::analysis::TrendPolicy;
use crate::poller::PollerConfig;
use crate::secrets::SecretSource;
use crate::submit::UploadLimits;

/// Top-level client configuration. Every section has defaults, so `{}` is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// SQLite file for the local backend.
    #[serde(default)]
    pub database_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default = "default_token_env_var")]
    pub token_env_var: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_token_env_var() -> Option<String> {
    Some("LABCOMPARE_API_TOKEN".to_string())
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            token_file: None,
            token_env_var: default_token_env_var(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn token_source(&self) -> SecretSource<'_> {
        SecretSource {
            inline: self.token.as_deref(),
            file: self.token_file.as_deref(),
            env_var: self.token_env_var.as_deref(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_secs() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    30
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_min_files")]
    pub min_files: usize,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

fn default_min_files() -> usize {
    2
}

fn default_max_files() -> usize {
    10
}

fn default_max_file_bytes() -> u64 {
    15 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "application/pdf".to_string(),
    ]
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            min_files: default_min_files(),
            max_files: default_max_files(),
            max_file_bytes: default_max_file_bytes(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Largest step between consecutive values, as a fraction of the mean,
    /// that still counts as "no change".
    #[serde(default = "default_stable_tolerance")]
    pub stable_tolerance: f64,
}

fn default_stable_tolerance() -> f64 {
    0.05
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stable_tolerance: default_stable_tolerance(),
        }
    }
}

impl Config {
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(self.polling.interval_secs),
            max_attempts: self.polling.max_attempts,
        }
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            min_files: self.upload.min_files,
            max_files: self.upload.max_files,
            max_file_bytes: self.upload.max_file_bytes,
            allowed_mime_types: self.upload.allowed_mime_types.clone(),
        }
    }

    pub fn trend_policy(&self) -> TrendPolicy {
        TrendPolicy {
            stable_tolerance: self.analysis.stable_tolerance,
        }
    }

    /// Configured database path with `~` expanded, or the default location.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(crate::secrets::expand_home(path))),
            None => crate::db::default_database_path(),
        }
    }
}
