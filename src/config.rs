use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::submission::{GroupingLimits, RetryPolicy};

/// Application-level constants
pub const APP_NAME: &str = "vaxsubmit";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ENCOUNTERS_PER_REQUEST: usize = 10;
pub const DEFAULT_MAX_EPISODES_PER_REQUEST: usize = 20;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_MS: u64 = 1_000;
pub const DEFAULT_CONFIRMABLE_ERROR_CODES: &[&str] = &["AIR-E-1046"];

/// Tracing filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,vaxsubmit_lib=debug"
    } else {
        "info"
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Connection settings for the registry endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub product_id: String,
    pub timeout_secs: u64,
}

/// Knobs of the submission pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub limits: GroupingLimits,
    pub retry: RetryPolicy,
    /// Batches in flight at once. 1 keeps dispatch sequential.
    pub dispatch_concurrency: usize,
    pub confirmable_error_codes: Vec<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            limits: GroupingLimits {
                max_encounters_per_request: DEFAULT_MAX_ENCOUNTERS_PER_REQUEST,
                max_episodes_per_request: DEFAULT_MAX_EPISODES_PER_REQUEST,
            },
            retry: RetryPolicy::new(
                DEFAULT_RETRY_ATTEMPTS,
                Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            ),
            dispatch_concurrency: 1,
            confirmable_error_codes: DEFAULT_CONFIRMABLE_ERROR_CODES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub registry: RegistryConfig,
    pub pipeline: PipelineSettings,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (environment, map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = get("VAXSUBMIT_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            key: "VAXSUBMIT_BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let base_url = get("AIR_BASE_URL").ok_or(ConfigError::Missing("AIR_BASE_URL"))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "AIR_BASE_URL",
                value: base_url,
                reason: "must be an http(s) URL".into(),
            });
        }

        let registry = RegistryConfig {
            base_url,
            api_key: get("AIR_API_KEY"),
            bearer_token: get("AIR_BEARER_TOKEN"),
            product_id: get("AIR_PRODUCT_ID").unwrap_or_else(|| format!("{APP_NAME} {APP_VERSION}")),
            timeout_secs: positive(&get, "AIR_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
        };

        let confirmable_error_codes = match get("AIR_CONFIRMABLE_ERROR_CODES") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            None => PipelineSettings::default().confirmable_error_codes,
        };

        let pipeline = PipelineSettings {
            limits: GroupingLimits {
                max_encounters_per_request: positive(
                    &get,
                    "AIR_MAX_ENCOUNTERS_PER_REQUEST",
                    DEFAULT_MAX_ENCOUNTERS_PER_REQUEST as u64,
                )? as usize,
                max_episodes_per_request: positive(
                    &get,
                    "AIR_MAX_EPISODES_PER_REQUEST",
                    DEFAULT_MAX_EPISODES_PER_REQUEST as u64,
                )? as usize,
            },
            retry: RetryPolicy::new(
                positive(&get, "AIR_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS as u64)? as u32,
                Duration::from_millis(positive(&get, "AIR_RETRY_BASE_MS", DEFAULT_RETRY_BASE_MS)?),
            ),
            dispatch_concurrency: positive(&get, "AIR_DISPATCH_CONCURRENCY", 1)? as usize,
            confirmable_error_codes,
        };

        Ok(Self {
            bind_addr,
            registry,
            pipeline,
        })
    }
}

fn positive<G>(get: &G, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero".into(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: e.to_string(),
        }),
    }
}
