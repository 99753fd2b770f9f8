//! Object storage configuration types

use crate::{get_env_or_default, get_optional_env, parse_env, ConfigError, ConfigResult};

/// Default bucket holding stems and merged quiz audio
pub const DEFAULT_BUCKET: &str = "multitune-stem-storage";

/// Default Google Cloud Storage endpoint
pub const DEFAULT_GCS_URL: &str = "https://storage.googleapis.com";

/// Object storage (Google Cloud Storage JSON API) configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket name
    pub bucket: String,

    /// Base URL of the JSON API (overridable for emulators and tests)
    pub api_url: String,

    /// Base URL used to build public object URLs
    pub public_url: String,

    /// Optional OAuth bearer token
    pub access_token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl StorageConfig {
    /// Load storage configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let bucket = get_env_or_default("GCS_BUCKET_NAME", DEFAULT_BUCKET);
        if bucket.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "GCS_BUCKET_NAME".to_string(),
                "bucket name cannot be empty".to_string(),
            ));
        }

        let api_url = get_env_or_default("GCS_BASE_URL", DEFAULT_GCS_URL);
        Ok(Self {
            bucket,
            public_url: get_optional_env("GCS_PUBLIC_URL").unwrap_or_else(|| api_url.clone()),
            api_url,
            access_token: get_optional_env("GCS_ACCESS_TOKEN"),
            timeout_secs: parse_env("GCS_TIMEOUT", 120)?,
        })
    }

    /// Create a configuration pointing at a custom endpoint (useful for testing)
    pub fn with_endpoint(bucket: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            bucket: bucket.into(),
            public_url: url.clone(),
            api_url: url,
            access_token: None,
            timeout_secs: 120,
        }
    }
}
