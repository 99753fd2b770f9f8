//! Shared configuration types for Multitune services
//!
//! This crate provides the configuration types shared by the audio processor
//! binary and its one-shot tooling, so that every entry point reads the same
//! environment variables with the same defaults.

mod core_api;
mod error;
mod redis;
mod storage;

pub use core_api::CoreApiConfig;
pub use error::{ConfigError, ConfigResult};
pub use redis::RedisConfig;
pub use storage::StorageConfig;

use std::env;

/// Common configuration shared between all entry points
#[derive(Debug, Clone)]
pub struct CommonConfig {
    /// Redis configuration (job store and ingress channel)
    pub redis: RedisConfig,

    /// Object storage configuration
    pub storage: StorageConfig,

    /// Core API configuration (optional, only the quiz flow needs it)
    pub core_api: Option<CoreApiConfig>,

    /// Environment mode (development, staging, production)
    pub environment: Environment,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl CommonConfig {
    /// Load common configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            redis: RedisConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            core_api: CoreApiConfig::from_env().ok(),
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse()
                .unwrap_or_default(),
        })
    }
}

/// Helper function to get a required environment variable
pub fn get_required_env(name: &str) -> ConfigResult<String> {
    env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to read an optional, non-empty environment variable
pub fn get_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "prod".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "stage".parse::<Environment>().unwrap(),
            Environment::Staging
        );
        assert_eq!(
            "anything".parse::<Environment>().unwrap(),
            Environment::Development
        );
    }

    #[test]
    fn test_environment_display() {
        assert_eq!(format!("{}", Environment::Production), "production");
        assert_eq!(format!("{}", Environment::Development), "development");
    }

    #[test]
    fn test_parse_env_default_and_override() {
        temp_env::with_var_unset("MULTITUNE_TEST_PARSE", || {
            assert_eq!(parse_env("MULTITUNE_TEST_PARSE", 7u64).unwrap(), 7);
        });
        temp_env::with_var("MULTITUNE_TEST_PARSE", Some(" 12 "), || {
            assert_eq!(parse_env("MULTITUNE_TEST_PARSE", 7u64).unwrap(), 12);
        });
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        temp_env::with_var("MULTITUNE_TEST_PARSE", Some("-3"), || {
            let err = parse_env::<u64>("MULTITUNE_TEST_PARSE", 1).unwrap_err();
            assert_eq!(err.variable(), Some("MULTITUNE_TEST_PARSE"));
        });
    }

    #[test]
    fn test_optional_env_ignores_blank_values() {
        temp_env::with_var("MULTITUNE_TEST_OPTIONAL", Some("   "), || {
            assert!(get_optional_env("MULTITUNE_TEST_OPTIONAL").is_none());
        });
    }

    #[test]
    fn test_common_config_without_core_api() {
        temp_env::with_vars(
            [
                ("CORE_API_URL", None::<&str>),
                ("ENVIRONMENT", Some("production")),
            ],
            || {
                let config = CommonConfig::from_env().unwrap();
                assert!(config.core_api.is_none());
                assert_eq!(config.environment, Environment::Production);
            },
        );
    }
}
