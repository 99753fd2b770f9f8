//! Core API configuration types

use crate::{get_required_env, parse_env, ConfigError, ConfigResult};

/// Configuration for the core API that owns tracks and quiz audios
#[derive(Debug, Clone)]
pub struct CoreApiConfig {
    /// Root URL, without the `/api` suffix
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl CoreApiConfig {
    /// Load core API configuration from environment variables
    ///
    /// Returns an error if `CORE_API_URL` is not set, so callers can use
    /// `.ok()` to get `Option<CoreApiConfig>`.
    pub fn from_env() -> ConfigResult<Self> {
        let url = get_required_env("CORE_API_URL")?;

        if url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "CORE_API_URL".to_string(),
                "URL cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            timeout_secs: parse_env("CORE_API_TIMEOUT", 30)?,
        })
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url() {
        temp_env::with_var_unset("CORE_API_URL", || {
            assert!(matches!(
                CoreApiConfig::from_env(),
                Err(ConfigError::MissingEnvVar(_))
            ));
        });
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        temp_env::with_var("CORE_API_URL", Some("http://core:3000/"), || {
            let config = CoreApiConfig::from_env().unwrap();
            assert_eq!(config.url, "http://core:3000");
            assert_eq!(config.timeout_secs, 30);
        });
    }
}
