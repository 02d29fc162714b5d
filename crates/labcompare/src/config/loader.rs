use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

/// Serialization format of a config document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml` / `.yml` are YAML, everything else is treated as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = load_config_from_str(&content, ConfigFormat::from_path(path))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn load_config_from_str(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let config: Config = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
        Err(ConfigError::Validation {
            message: message.into(),
        })
    }

    if config.api.base_url.trim().is_empty() {
        return invalid("api.base_url must not be empty");
    }

    if config.polling.interval_secs == 0 {
        return invalid("polling.interval_secs must be greater than 0");
    }
    if config.polling.max_attempts == 0 {
        return invalid("polling.max_attempts must be greater than 0");
    }

    let upload = &config.upload;
    if upload.min_files < 2 {
        return invalid(format!(
            "upload.min_files must be at least 2, got {}",
            upload.min_files
        ));
    }
    if upload.max_files > 10 {
        return invalid(format!(
            "upload.max_files must be at most 10, got {}",
            upload.max_files
        ));
    }
    if upload.min_files > upload.max_files {
        return invalid(format!(
            "upload.min_files ({}) exceeds upload.max_files ({})",
            upload.min_files, upload.max_files
        ));
    }
    if upload.max_file_bytes == 0 {
        return invalid("upload.max_file_bytes must be greater than 0");
    }
    if upload.allowed_mime_types.is_empty() {
        return invalid("upload.allowed_mime_types must not be empty");
    }

    let tolerance = config.analysis.stable_tolerance;
    if !(0.0..1.0).contains(&tolerance) {
        return invalid(format!(
            "analysis.stable_tolerance must be in [0, 1), got {}",
            tolerance
        ));
    }

    Ok(())
}
