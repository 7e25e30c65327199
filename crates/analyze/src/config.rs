use ingest::PlannerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("request_timeout_secs must be at least 1")]
    ZeroTimeout,
    #[error("max_chunk_chars must be at least 1")]
    ZeroChunkBound,
    #[error("max_backoff_ms ({max}) is below initial_backoff_ms ({initial})")]
    BackoffCapBelowInitial { initial: u64, max: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Documents longer than this many characters are chunked
    pub large_document_threshold: usize,
    pub max_chunk_chars: usize,
    pub boundary_lookback_chars: usize,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per backend call, first try included
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            large_document_threshold: 40_000,
            max_chunk_chars: 20_000,
            boundary_lookback_chars: 4_000,
            request_timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 10000,
        }
    }
}

impl PipelineConfig {
    /// Reject settings that would make every backend call fail or let the
    /// first retry delay exceed its cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_chunk_chars == 0 {
            return Err(ConfigError::ZeroChunkBound);
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::BackoffCapBelowInitial {
                initial: self.retry.initial_backoff_ms,
                max: self.retry.max_backoff_ms,
            });
        }
        Ok(())
    }

    pub fn planner(&self) -> PlannerConfig {
        PlannerConfig {
            max_chunk_chars: self.max_chunk_chars,
            boundary_lookback_chars: self.boundary_lookback_chars,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
