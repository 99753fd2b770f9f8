//! Processor configuration loaded from environment variables
//!
//! Shared settings (Redis, object storage, core API) come from
//! `multitune-shared-config`; this module adds the processor's own knobs.
//! Every value has a development default.

use std::str::FromStr;
use std::time::Duration;

use multitune_shared_config::{
    get_env_or_default, parse_env, CommonConfig, ConfigError, ConfigResult, CoreApiConfig,
    Environment, RedisConfig, StorageConfig,
};

/// Default public Deezer API
pub const DEFAULT_DEEZER_API_URL: &str = "https://api.deezer.com";

/// Which backend holds job records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("expected 'redis' or 'memory', got '{}'", other)),
        }
    }
}

/// Processor configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Configuration shared with other entry points
    pub common: CommonConfig,

    /// Maximum separations running at once
    pub max_concurrent_jobs: usize,

    /// Seconds between recovery ticks
    pub recovery_interval_secs: u64,

    /// Seconds after which a processing job is considered stuck
    pub job_processing_timeout_secs: u64,

    /// Seconds after creation when a job record is deleted
    pub job_expiry_secs: u64,

    /// Ingress pub/sub channel
    pub job_channel: String,

    /// Health endpoint port
    pub http_port: u16,

    /// Separation model name
    pub separation_model: String,

    /// Separator executable
    pub demucs_command: String,

    /// ffmpeg executable
    pub ffmpeg_path: String,

    /// Seconds to wait for running jobs on shutdown
    pub shutdown_grace_secs: u64,

    /// Upper bound for the ingress reconnect backoff
    pub dispatcher_max_backoff_secs: u64,

    /// Job store backend
    pub store_backend: StoreBackend,

    /// Deezer API base URL (overridable for tests)
    pub deezer_api_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            common: CommonConfig::from_env()?,
            max_concurrent_jobs: parse_env("MAX_CONCURRENT_JOBS", 1)?,
            recovery_interval_secs: parse_env("RECOVERY_INTERVAL_SECS", 60)?,
            job_processing_timeout_secs: parse_env("JOB_PROCESSING_TIMEOUT_SECS", 60)?,
            job_expiry_secs: parse_env("JOB_EXPIRY_SECS", 300)?,
            job_channel: get_env_or_default("JOB_CHANNEL", "audio:process"),
            http_port: parse_env("HTTP_PORT", 5000)?,
            separation_model: get_env_or_default("SEPARATION_MODEL", "htdemucs_6s"),
            demucs_command: get_env_or_default("DEMUCS_COMMAND", "demucs"),
            ffmpeg_path: get_env_or_default("FFMPEG_PATH", "ffmpeg"),
            shutdown_grace_secs: parse_env("SHUTDOWN_GRACE_SECS", 30)?,
            dispatcher_max_backoff_secs: parse_env("DISPATCHER_MAX_BACKOFF_SECS", 60)?,
            store_backend: parse_env("JOB_STORE", StoreBackend::Redis)?,
            deezer_api_url: get_env_or_default("DEEZER_API_URL", DEFAULT_DEEZER_API_URL),
        })
    }

    /// Reject settings the processor cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_CONCURRENT_JOBS must be at least 1".to_string(),
            ));
        }
        if self.recovery_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "RECOVERY_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }
        if self.job_expiry_secs < self.job_processing_timeout_secs {
            return Err(ConfigError::ValidationError(format!(
                "JOB_EXPIRY_SECS ({}) is shorter than JOB_PROCESSING_TIMEOUT_SECS ({})",
                self.job_expiry_secs, self.job_processing_timeout_secs
            )));
        }
        if self.job_channel.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "JOB_CHANNEL cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get Redis configuration
    pub fn redis(&self) -> &RedisConfig {
        &self.common.redis
    }

    /// Get storage configuration
    pub fn storage(&self) -> &StorageConfig {
        &self.common.storage
    }

    /// Get core API configuration (if configured)
    pub fn core_api(&self) -> Option<&CoreApiConfig> {
        self.common.core_api.as_ref()
    }

    /// Get environment mode
    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_interval_secs)
    }

    pub fn processing_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.job_processing_timeout_secs as i64)
    }

    pub fn job_expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.job_expiry_secs as i64)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn dispatcher_max_backoff(&self) -> Duration {
        Duration::from_secs(self.dispatcher_max_backoff_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROCESSOR_VARS: [&str; 13] = [
        "MAX_CONCURRENT_JOBS",
        "RECOVERY_INTERVAL_SECS",
        "JOB_PROCESSING_TIMEOUT_SECS",
        "JOB_EXPIRY_SECS",
        "JOB_CHANNEL",
        "HTTP_PORT",
        "SEPARATION_MODEL",
        "DEMUCS_COMMAND",
        "FFMPEG_PATH",
        "SHUTDOWN_GRACE_SECS",
        "DISPATCHER_MAX_BACKOFF_SECS",
        "JOB_STORE",
        "DEEZER_API_URL",
    ];

    fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
        with_overrides(&[])
    }

    /// Every processor variable unset except the given ones
    fn with_overrides(
        overrides: &[(&'static str, &'static str)],
    ) -> Vec<(&'static str, Option<&'static str>)> {
        PROCESSOR_VARS
            .iter()
            .map(|name| {
                let value = overrides
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| *value);
                (*name, value)
            })
            .collect()
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(cleared(), || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.max_concurrent_jobs, 1);
            assert_eq!(config.recovery_interval_secs, 60);
            assert_eq!(config.job_processing_timeout_secs, 60);
            assert_eq!(config.job_expiry_secs, 300);
            assert_eq!(config.job_channel, "audio:process");
            assert_eq!(config.http_port, 5000);
            assert_eq!(config.separation_model, "htdemucs_6s");
            assert_eq!(config.demucs_command, "demucs");
            assert_eq!(config.ffmpeg_path, "ffmpeg");
            assert_eq!(config.store_backend, StoreBackend::Redis);
            assert_eq!(config.deezer_api_url, DEFAULT_DEEZER_API_URL);
            assert!(config.validate().is_ok());
        });
    }

    #[test]
    fn test_overrides() {
        let vars = with_overrides(&[
            ("MAX_CONCURRENT_JOBS", "4"),
            ("JOB_STORE", "memory"),
            ("HTTP_PORT", "8081"),
            ("JOB_CHANNEL", "audio:test"),
        ]);

        temp_env::with_vars(vars, || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.max_concurrent_jobs, 4);
            assert_eq!(config.store_backend, StoreBackend::Memory);
            assert_eq!(config.http_port, 8081);
            assert_eq!(config.job_channel, "audio:test");
        });
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let vars = with_overrides(&[("MAX_CONCURRENT_JOBS", "many")]);

        temp_env::with_vars(vars, || {
            let err = Config::from_env().unwrap_err();
            assert_eq!(err.variable(), Some("MAX_CONCURRENT_JOBS"));
        });
    }

    #[test]
    fn test_invalid_store_backend() {
        let vars = with_overrides(&[("JOB_STORE", "postgres")]);

        temp_env::with_vars(vars, || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        temp_env::with_vars(cleared(), || {
            let mut config = Config::from_env().unwrap();
            config.max_concurrent_jobs = 0;
            assert!(config.validate().is_err());
        });
    }

    #[test]
    fn test_validate_rejects_expiry_shorter_than_timeout() {
        temp_env::with_vars(cleared(), || {
            let mut config = Config::from_env().unwrap();
            config.job_expiry_secs = 30;
            config.job_processing_timeout_secs = 60;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("JOB_EXPIRY_SECS"));

            config.job_expiry_secs = 300;
            config.recovery_interval_secs = 0;
            assert!(config.validate().is_err());
        });
    }

    #[test]
    fn test_duration_accessors() {
        temp_env::with_vars(cleared(), || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.recovery_interval(), Duration::from_secs(60));
            assert_eq!(config.processing_timeout(), chrono::Duration::seconds(60));
            assert_eq!(config.job_expiry(), chrono::Duration::minutes(5));
            assert_eq!(config.shutdown_grace(), Duration::from_secs(30));
        });
    }
}
