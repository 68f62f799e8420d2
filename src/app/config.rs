use clap::{Parser, ValueEnum};
use std::time::Duration;
use url::Url;

use crate::models::Processor;
use crate::queue::worker::RetryPolicy;
use crate::services::circuit_breaker::BreakerSettings;
use crate::services::payment_processor_client::ProcessorSettings;

/// What `submit` does when the intake queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverflowPolicy {
    /// Wait for a free slot.
    Block,
    /// Fail fast with `QueueError::Full`.
    Reject,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("QUEUE_BUFFER_SIZE must be greater than zero")]
    EmptyQueue,
    #[error("RETRY_BACKOFF_BASE_MS ({base}) must not exceed RETRY_BACKOFF_MAX_MS ({max})")]
    Backoff { base: u64, max: u64 },
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "payment-dispatcher",
    about = "Payment intake with default/fallback processor dispatch"
)]
pub struct Config {
    #[arg(long, env = "HTTP_PORT", default_value_t = 9999)]
    pub server_port: u16,

    #[arg(
        long,
        env = "DEFAULT_PROCESSOR_URL",
        default_value = "http://payment-processor-default:8080"
    )]
    pub default_processor_url: Url,
    #[arg(
        long,
        env = "FALLBACK_PROCESSOR_URL",
        default_value = "http://payment-processor-fallback:8080"
    )]
    pub fallback_processor_url: Url,

    #[arg(long, env = "HTTP_DEFAULT_TIMEOUT_MS", default_value_t = 5_000)]
    pub default_timeout_ms: u64,
    #[arg(long, env = "HTTP_FALLBACK_TIMEOUT_MS", default_value_t = 5_000)]
    pub fallback_timeout_ms: u64,

    /// Consecutive failures that open the default breaker; it opens on the
    /// Nth failure, so the (N+1)th call is short-circuited.
    #[arg(long, env = "CONSECUTIVE_FAILURES_DEFAULT", default_value_t = 5)]
    pub consecutive_failures_default: u32,
    /// Consecutive failures that open the fallback breaker, counted the same
    /// way as for the default processor.
    #[arg(long, env = "CONSECUTIVE_FAILURES_FALLBACK", default_value_t = 5)]
    pub consecutive_failures_fallback: u32,

    #[arg(long, env = "CIRCUIT_BREAKER_INTERVAL_DEFAULT_MS", default_value_t = 10_000)]
    pub breaker_interval_default_ms: u64,
    #[arg(long, env = "CIRCUIT_BREAKER_INTERVAL_FALLBACK_MS", default_value_t = 10_000)]
    pub breaker_interval_fallback_ms: u64,

    #[arg(long, env = "CIRCUIT_BREAKER_TIMEOUT_DEFAULT_MS", default_value_t = 5_000)]
    pub breaker_timeout_default_ms: u64,
    #[arg(long, env = "CIRCUIT_BREAKER_TIMEOUT_FALLBACK_MS", default_value_t = 5_000)]
    pub breaker_timeout_fallback_ms: u64,

    #[arg(long, env = "HALF_OPEN_REQUESTS_DEFAULT", default_value_t = 5)]
    pub half_open_requests_default: u32,
    #[arg(long, env = "HALF_OPEN_REQUESTS_FALLBACK", default_value_t = 1)]
    pub half_open_requests_fallback: u32,

    /// Zero means one worker per CPU.
    #[arg(long, env = "WORKERS_COUNT", default_value_t = 5)]
    pub workers_count: usize,
    #[arg(long, env = "QUEUE_BUFFER_SIZE", default_value_t = 20_000)]
    pub queue_buffer_size: usize,
    #[arg(long, env = "QUEUE_OVERFLOW", value_enum, default_value_t = OverflowPolicy::Block)]
    pub queue_overflow: OverflowPolicy,

    /// Zero means retry forever.
    #[arg(long, env = "MAX_DISPATCH_ATTEMPTS", default_value_t = 100)]
    pub max_dispatch_attempts: u32,
    #[arg(long, env = "RETRY_BACKOFF_BASE_MS", default_value_t = 5)]
    pub retry_backoff_base_ms: u64,
    #[arg(long, env = "RETRY_BACKOFF_MAX_MS", default_value_t = 1_000)]
    pub retry_backoff_max_ms: u64,
    /// Dead letters kept for `GET /dead-letters`; older ones are evicted.
    #[arg(long, env = "DEAD_LETTER_CAPACITY", default_value_t = 1_000)]
    pub dead_letter_capacity: usize,

    /// Redis connection string; the in-memory store is used when unset.
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,
    #[arg(long, env = "PAYMENT_TABLE_HASH", default_value = "payments")]
    pub payment_table_hash: String,
}

impl Config {
    /// Reads flags, falling back to environment variables and defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_buffer_size == 0 {
            return Err(ConfigError::EmptyQueue);
        }
        if self.retry_backoff_base_ms > self.retry_backoff_max_ms {
            return Err(ConfigError::Backoff {
                base: self.retry_backoff_base_ms,
                max: self.retry_backoff_max_ms,
            });
        }
        Ok(())
    }

    pub fn workers(&self) -> usize {
        if self.workers_count == 0 {
            num_cpus::get()
        } else {
            self.workers_count
        }
    }

    pub fn processor_settings(&self, processor: Processor) -> ProcessorSettings {
        let (url, timeout_ms, threshold, interval_ms, breaker_timeout_ms, max_requests) =
            match processor {
            Processor::Default => (
                &self.default_processor_url,
                self.default_timeout_ms,
                self.consecutive_failures_default,
                self.breaker_interval_default_ms,
                self.breaker_timeout_default_ms,
                self.half_open_requests_default,
            ),
            Processor::Fallback => (
                &self.fallback_processor_url,
                self.fallback_timeout_ms,
                self.consecutive_failures_fallback,
                self.breaker_interval_fallback_ms,
                self.breaker_timeout_fallback_ms,
                self.half_open_requests_fallback,
            ),
        };

        ProcessorSettings {
            base_url: url.clone(),
            timeout: Duration::from_millis(timeout_ms),
            breaker: BreakerSettings {
                name: format!("{processor}-processor"),
                max_requests,
                interval: Duration::from_millis(interval_ms),
                timeout: Duration::from_millis(breaker_timeout_ms),
                failure_threshold: threshold,
            },
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: (self.max_dispatch_attempts > 0).then_some(self.max_dispatch_attempts),
            base_delay: Duration::from_millis(self.retry_backoff_base_ms),
            max_delay: Duration::from_millis(self.retry_backoff_max_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["api"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_processor_settings_are_independent() {
        let config = parse(&[
            "--default-processor-url",
            "http://localhost:8001",
            "--fallback-processor-url",
            "http://localhost:8002",
            "--consecutive-failures-default",
            "3",
            "--consecutive-failures-fallback",
            "7",
            "--half-open-requests-fallback",
            "2",
        ]);

        let default = config.processor_settings(Processor::Default);
        let fallback = config.processor_settings(Processor::Fallback);

        assert_eq!(default.base_url.as_str(), "http://localhost:8001/");
        assert_eq!(fallback.base_url.as_str(), "http://localhost:8002/");
        assert_eq!(default.breaker.failure_threshold, 3);
        assert_eq!(fallback.breaker.failure_threshold, 7);
        assert_eq!(fallback.breaker.max_requests, 2);
        assert_eq!(default.breaker.name, "default-processor");
    }

    #[test]
    fn test_rejects_invalid_url() {
        let result = Config::try_parse_from(["api", "--default-processor-url", "not a url"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = parse(&["--queue-buffer-size", "10"]);
        assert!(config.validate().is_ok());

        config.queue_buffer_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyQueue)));

        config.queue_buffer_size = 10;
        config.retry_backoff_base_ms = 2_000;
        assert!(matches!(config.validate(), Err(ConfigError::Backoff { .. })));
    }

    #[test]
    fn test_retry_policy_and_workers() {
        let config = parse(&["--max-dispatch-attempts", "0", "--workers-count", "0"]);
        assert_eq!(config.retry_policy().max_attempts, None);
        assert!(config.workers() >= 1);
        assert_eq!(parse(&["--queue-overflow", "reject"]).queue_overflow, OverflowPolicy::Reject);
        assert_eq!(parse(&["--dead-letter-capacity", "3"]).dead_letter_capacity, 3);
    }
}
