//! Redis configuration types

use url::Url;

use crate::{get_env_or_default, get_optional_env, parse_env, ConfigError, ConfigResult};

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Optional password for Redis authentication
    pub password: Option<String>,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl RedisConfig {
    /// Load Redis configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let url = get_env_or_default("REDIS_URL", "redis://localhost:6379");
        Url::parse(&url).map_err(|e| ConfigError::InvalidUrl("REDIS_URL".to_string(), e.to_string()))?;

        Ok(Self {
            url,
            password: get_optional_env("REDIS_PASSWORD"),
            connect_timeout_secs: parse_env("REDIS_CONNECT_TIMEOUT", 5)?,
        })
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Build the full connection URL including password if set
    ///
    /// A password already embedded in the URL wins over `REDIS_PASSWORD`.
    pub fn connection_url(&self) -> String {
        let Some(ref password) = self.password else {
            return self.url.clone();
        };

        match Url::parse(&self.url) {
            Ok(mut parsed) if parsed.password().is_none() => {
                if parsed.set_password(Some(password)).is_err() {
                    return self.url.clone();
                }
                parsed.to_string()
            }
            _ => self.url.clone(),
        }
    }

    /// Connection URL with the password masked, for logging
    pub fn redacted_url(&self) -> String {
        match Url::parse(&self.connection_url()) {
            Ok(mut parsed) if parsed.password().is_some() => {
                let _ = parsed.set_password(Some("****"));
                parsed.to_string()
            }
            _ => self.url.clone(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            password: None,
            connect_timeout_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert!(config.password.is_none());
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[test]
    fn test_connection_url_no_password() {
        let config = RedisConfig::with_url("redis://cache:6380");
        assert_eq!(config.connection_url(), "redis://cache:6380");
    }

    #[test]
    fn test_connection_url_injects_password() {
        let config = RedisConfig {
            password: Some("s3cret".to_string()),
            ..RedisConfig::with_url("redis://cache:6380")
        };
        assert_eq!(config.connection_url(), "redis://:s3cret@cache:6380");
        assert_eq!(config.redacted_url(), "redis://:****@cache:6380");
    }

    #[test]
    fn test_embedded_password_is_kept() {
        let config = RedisConfig {
            password: Some("other".to_string()),
            ..RedisConfig::with_url("redis://:inline@cache:6379")
        };
        assert_eq!(config.connection_url(), "redis://:inline@cache:6379");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        temp_env::with_var("REDIS_URL", Some("not a url"), || {
            assert!(matches!(
                RedisConfig::from_env(),
                Err(ConfigError::InvalidUrl(..))
            ));
        });
    }
}
