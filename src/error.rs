use thiserror::Error;

use crate::models::{Processor, TotalOverflow};
use crate::services::circuit_breaker::BreakerRejection;

/// Why a single processor attempt did not settle the payment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("circuit breaker open")]
    CircuitOpen,
    #[error("failed to encode payload: {0}")]
    Encode(String),
}

impl From<BreakerRejection> for AttemptFailure {
    fn from(_: BreakerRejection) -> Self {
        AttemptFailure::CircuitOpen
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "storage-redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("both processors failed (default: {default}, fallback: {fallback})")]
    BothProcessorsFailed {
        default: AttemptFailure,
        fallback: AttemptFailure,
    },
    #[error("payment accepted by {processor} but not persisted: {source}")]
    Persistence {
        processor: Processor,
        #[source]
        source: StoreError,
    },
}

impl DispatchError {
    /// Only a failure on both processors is worth sending back to the queue.
    /// A persistence error after an accept must not re-charge the payment.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::BothProcessorsFailed { .. })
    }
}

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("both 'from' and 'to' parameters must be provided")]
    MissingBound,
    #[error("invalid date format: {0}")]
    InvalidTimestamp(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Overflow(#[from] TotalOverflow),
}

impl SummaryError {
    /// Caller mistakes, as opposed to backend failures.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SummaryError::MissingBound | SummaryError::InvalidTimestamp(_))
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("payment queue is full")]
    Full,
    #[error("payment queue is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let both = DispatchError::BothProcessorsFailed {
            default: AttemptFailure::CircuitOpen,
            fallback: AttemptFailure::Status(500),
        };
        assert!(both.is_retryable());

        let persistence = DispatchError::Persistence {
            processor: Processor::Default,
            source: StoreError::Backend("down".into()),
        };
        assert!(!persistence.is_retryable());
    }

    #[test]
    fn test_missing_bound_message() {
        assert_eq!(
            SummaryError::MissingBound.to_string(),
            "both 'from' and 'to' parameters must be provided"
        );
        assert!(SummaryError::MissingBound.is_client_error());
        assert!(!SummaryError::Store(StoreError::Backend("x".into())).is_client_error());
        assert!(!SummaryError::Overflow(TotalOverflow(Processor::Default)).is_client_error());
    }
}
