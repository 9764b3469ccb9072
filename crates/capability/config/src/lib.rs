//! 采集守护进程运行配置加载。

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub poll_interval_ms: u64,
    /// 每个周期同时轮询的引擎上限，0 表示不限
    pub poll_concurrency: usize,
    pub scheduler_enabled: bool,
    pub seed_file: Option<PathBuf>,
    pub command_dispatch_max_retries: u32,
    pub command_dispatch_backoff_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_concurrency: 0,
            scheduler_enabled: true,
            seed_file: None,
            command_dispatch_max_retries: 0,
            command_dispatch_backoff_ms: 0,
        }
    }
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let poll_interval_ms =
            read_u64_with_default("ACQ_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "ACQ_POLL_INTERVAL_MS".to_string(),
                "0".to_string(),
            ));
        }
        let poll_concurrency = read_u64_with_default("ACQ_POLL_CONCURRENCY", 0)?;
        let poll_concurrency = usize::try_from(poll_concurrency).map_err(|_| {
            ConfigError::Invalid(
                "ACQ_POLL_CONCURRENCY".to_string(),
                poll_concurrency.to_string(),
            )
        })?;
        let scheduler_enabled = read_bool_with_default("ACQ_SCHEDULER", true);
        let seed_file = read_optional("ACQ_SEED_FILE").map(PathBuf::from);
        let command_dispatch_max_retries =
            read_u32_with_default("ACQ_COMMAND_DISPATCH_MAX_RETRIES", 0)?;
        let command_dispatch_backoff_ms =
            read_u64_with_default("ACQ_COMMAND_DISPATCH_BACKOFF_MS", 0)?;

        Ok(Self {
            poll_interval_ms,
            poll_concurrency,
            scheduler_enabled,
            seed_file,
            command_dispatch_max_retries,
            command_dispatch_backoff_ms,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
