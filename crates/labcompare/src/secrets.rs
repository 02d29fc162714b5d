//! API token resolution.
//!
//! The backend token can come from three places, checked in order:
//!
//! 1. **Inline value** in the config file (handy for local testing)
//! 2. **Token file**, e.g. a mounted Docker/Kubernetes secret
//! 3. **Environment variable** (defaults to `LABCOMPARE_API_TOKEN`)

use secrecy::SecretString;
use std::fs;

/// Error type for token resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No token source configured (need one of: inline token, token file, or env var)")]
    NoSourceProvided,

    #[error("Failed to read token file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a secret may be found. Empty strings count as "not configured".
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSource<'a> {
    pub inline: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSource<'a> {
    /// True if at least one non-empty source is configured.
    pub fn is_configured(&self) -> bool {
        non_empty(self.inline).is_some()
            || non_empty(self.file).is_some()
            || non_empty(self.env_var).is_some()
    }

    /// Resolves the secret from the first configured source.
    ///
    /// A configured source that fails (missing file, unset variable) is an
    /// error; later sources are not consulted.
    pub fn resolve(&self) -> Result<SecretString> {
        if let Some(value) = non_empty(self.inline) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_empty(self.file) {
            let expanded = expand_home(path);
            return fs::read_to_string(&expanded)
                .map(|content| SecretString::from(content.trim().to_string()))
                .map_err(|source| SecretError::FileReadError {
                    path: expanded,
                    source,
                });
        }

        if let Some(name) = non_empty(self.env_var) {
            return match std::env::var(name) {
                Ok(value) => Ok(SecretString::from(value.trim().to_string())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Err(SecretError::NoSourceProvided)
    }

    /// Like [`resolve`](Self::resolve), but an unset environment variable or
    /// missing source yields `None` instead of an error. A token is optional
    /// for backends that do not require authentication.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Expands a leading `~` to the user's home directory.
///
/// `~user/path` is not supported.
pub(crate) fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_inline_value_takes_priority() {
        std::env::set_var("LABCOMPARE_TEST_TOKEN_1", "env_value");
        let source = SecretSource {
            inline: Some("inline_value"),
            file: None,
            env_var: Some("LABCOMPARE_TEST_TOKEN_1"),
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "inline_value");
        std::env::remove_var("LABCOMPARE_TEST_TOKEN_1");
    }

    #[test]
    #[serial]
    fn test_file_takes_priority_over_env() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "  file_value  ").unwrap();
        std::env::set_var("LABCOMPARE_TEST_TOKEN_2", "env_value");

        let path = temp_file.path().to_str().unwrap();
        let source = SecretSource {
            inline: Some(""),
            file: Some(path),
            env_var: Some("LABCOMPARE_TEST_TOKEN_2"),
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "file_value");
        std::env::remove_var("LABCOMPARE_TEST_TOKEN_2");
    }

    #[test]
    #[serial]
    fn test_env_var_fallback() {
        std::env::set_var("LABCOMPARE_TEST_TOKEN_3", "env_value\n");
        let source = SecretSource {
            env_var: Some("LABCOMPARE_TEST_TOKEN_3"),
            ..Default::default()
        };
        assert_eq!(source.resolve().unwrap().expose_secret(), "env_value");
        std::env::remove_var("LABCOMPARE_TEST_TOKEN_3");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let source = SecretSource {
            file: Some("/nonexistent/labcompare/token"),
            ..Default::default()
        };
        assert!(matches!(
            source.resolve(),
            Err(SecretError::FileReadError { .. })
        ));
        assert!(source.resolve_optional().is_err());
    }

    #[test]
    fn test_optional_token() {
        assert!(SecretSource::default().resolve_optional().unwrap().is_none());

        let unset = SecretSource {
            env_var: Some("LABCOMPARE_DEFINITELY_UNSET_98765"),
            ..Default::default()
        };
        assert!(unset.resolve_optional().unwrap().is_none());
        assert!(matches!(
            unset.resolve(),
            Err(SecretError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn test_is_configured() {
        assert!(!SecretSource::default().is_configured());
        assert!(!SecretSource {
            inline: Some(""),
            file: Some(""),
            env_var: Some(""),
        }
        .is_configured());
        assert!(SecretSource {
            env_var: Some("X"),
            ..Default::default()
        }
        .is_configured());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/absolute/path"), "/absolute/path");
        assert_eq!(expand_home("relative/path"), "relative/path");
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy().into_owned();
            assert_eq!(expand_home("~/token"), format!("{}/token", home));
            assert_eq!(expand_home("~"), home);
        }
    }
}
