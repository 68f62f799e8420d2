use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::error::{QueueError, SummaryError};
use crate::models::{PaymentRequest, PaymentSummary, Processor};
use crate::queue::{DeadLetter, DeadLetters, PaymentQueue};
use crate::services::atomic_metrics::{AtomicMetrics, MetricsSnapshot};
use crate::services::circuit_breaker::CircuitBreakerState;
use crate::services::payment_processor_client::PaymentGateway;
use crate::services::summary::SummaryAggregator;
use crate::storage::PaymentStore;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SummaryFilters {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CircuitBreakers {
    pub default: Option<CircuitBreakerState>,
    pub fallback: Option<CircuitBreakerState>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    #[serde(flatten)]
    pub counters: MetricsSnapshot,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub dead_letters: usize,
    pub circuit_breakers: CircuitBreakers,
}

/// The two operations exposed to the HTTP layer: fire-and-forget submit and
/// on-demand summary.
pub struct PaymentService {
    queue: Arc<PaymentQueue>,
    summary: SummaryAggregator,
    gateway: Arc<dyn PaymentGateway>,
    metrics: Arc<AtomicMetrics>,
    dead_letters: Arc<DeadLetters>,
}

impl PaymentService {
    pub fn new(
        queue: Arc<PaymentQueue>,
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        metrics: Arc<AtomicMetrics>,
        dead_letters: Arc<DeadLetters>,
    ) -> Self {
        Self {
            queue,
            summary: SummaryAggregator::new(store),
            gateway,
            metrics,
            dead_letters,
        }
    }

    /// Enqueues the payment and returns without waiting for dispatch.
    pub async fn submit_payment(&self, request: PaymentRequest) -> Result<(), QueueError> {
        let correlation_id = request.correlation_id.clone();
        match self.queue.enqueue(request).await {
            Ok(()) => {
                self.metrics.increment_submitted();
                Ok(())
            }
            Err(e) => {
                self.metrics.increment_rejected();
                warn!(correlation_id = %correlation_id, error = %e, "payment not enqueued");
                Err(e)
            }
        }
    }

    pub async fn get_summary(
        &self,
        filters: SummaryFilters,
    ) -> Result<PaymentSummary, SummaryError> {
        self.summary
            .summarize(filters.from.as_deref(), filters.to.as_deref())
            .await
    }

    pub fn circuit_breaker_status(&self, processor: Processor) -> Option<CircuitBreakerState> {
        self.gateway.circuit_state(processor)
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            counters: self.metrics.snapshot(),
            queue_depth: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            dead_letters: self.dead_letters.len(),
            circuit_breakers: CircuitBreakers {
                default: self.circuit_breaker_status(Processor::Default),
                fallback: self.circuit_breaker_status(Processor::Fallback),
            },
        }
    }

    /// Retained dead letters, oldest first.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.snapshot()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::OverflowPolicy;
    use crate::services::dispatcher::tests::ScriptedGateway;
    use crate::storage::InMemoryStore;
    use rust_decimal_macros::dec;

    fn service(capacity: usize) -> PaymentService {
        PaymentService::new(
            Arc::new(PaymentQueue::new(capacity, OverflowPolicy::Reject)),
            Arc::new(InMemoryStore::new()),
            Arc::new(ScriptedGateway::default()),
            Arc::new(AtomicMetrics::new()),
            Arc::new(DeadLetters::new(16)),
        )
    }

    #[tokio::test]
    async fn test_submit_counts_accepted_and_rejected() {
        let service = service(1);

        service.submit_payment(PaymentRequest::new("a", dec!(1))).await.unwrap();
        let err = service.submit_payment(PaymentRequest::new("b", dec!(1))).await.unwrap_err();

        assert_eq!(err, QueueError::Full);
        let status = service.status();
        assert_eq!(status.counters.submitted, 1);
        assert_eq!(status.counters.rejected, 1);
        assert_eq!(status.queue_depth, 1);
        assert_eq!(status.queue_capacity, 1);
        assert_eq!(status.circuit_breakers.default, None);
        assert!(service.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_summary_filters() {
        let service = service(1);

        let empty = service.get_summary(SummaryFilters::default()).await.unwrap();
        assert_eq!(empty, PaymentSummary::default());

        let err = service
            .get_summary(SummaryFilters {
                from: Some("2025-07-10T00:00:00Z".into()),
                to: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SummaryError::MissingBound));
    }
}
