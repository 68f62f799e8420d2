use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::DispatchError;
use crate::models::{PaymentRequest, Processor};
use crate::services::atomic_metrics::AtomicMetrics;
use crate::services::payment_processor_client::{PaymentGateway, ProcessorOutcome};
use crate::storage::PaymentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Accepted by `Processor` and recorded.
    Persisted(Processor),
    /// `Processor` answered with a conflict; nothing is recorded.
    AlreadyProcessed(Processor),
}

/// Tries the default processor, then the fallback, and records the accepted
/// attempt under the correlation id.
pub struct PaymentDispatcher {
    gateway: Arc<dyn PaymentGateway>,
    store: Arc<dyn PaymentStore>,
    metrics: Arc<AtomicMetrics>,
}

impl PaymentDispatcher {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn PaymentStore>,
        metrics: Arc<AtomicMetrics>,
    ) -> Self {
        Self {
            gateway,
            store,
            metrics,
        }
    }

    pub async fn dispatch(
        &self,
        request: &PaymentRequest,
    ) -> Result<DispatchOutcome, DispatchError> {
        // Try default processor first
        let default_failure = match self.gateway.attempt(request, Processor::Default).await {
            ProcessorOutcome::Accepted(body) => {
                return self.persist(request, Processor::Default, body).await
            }
            ProcessorOutcome::Conflict => {
                return Ok(self.already_processed(request, Processor::Default))
            }
            ProcessorOutcome::Failure(failure) => failure,
        };

        // Fallback to secondary processor
        match self.gateway.attempt(request, Processor::Fallback).await {
            ProcessorOutcome::Accepted(body) => {
                self.persist(request, Processor::Fallback, body).await
            }
            ProcessorOutcome::Conflict => Ok(self.already_processed(request, Processor::Fallback)),
            ProcessorOutcome::Failure(fallback_failure) => {
                debug!(
                    correlation_id = %request.correlation_id,
                    default = %default_failure,
                    fallback = %fallback_failure,
                    "both processors failed"
                );
                Err(DispatchError::BothProcessorsFailed {
                    default: default_failure,
                    fallback: fallback_failure,
                })
            }
        }
    }

    async fn persist(
        &self,
        request: &PaymentRequest,
        processor: Processor,
        body: Vec<u8>,
    ) -> Result<DispatchOutcome, DispatchError> {
        match self.store.upsert(&request.correlation_id, body).await {
            Ok(()) => {
                self.metrics.increment_processed(processor);
                debug!(
                    correlation_id = %request.correlation_id,
                    processor = %processor,
                    "payment processed"
                );
                Ok(DispatchOutcome::Persisted(processor))
            }
            Err(source) => {
                self.metrics.increment_persistence_failures();
                error!(
                    correlation_id = %request.correlation_id,
                    processor = %processor,
                    error = %source,
                    "failed to save accepted payment"
                );
                Err(DispatchError::Persistence { processor, source })
            }
        }
    }

    fn already_processed(&self, request: &PaymentRequest, processor: Processor) -> DispatchOutcome {
        self.metrics.increment_already_processed();
        info!(
            correlation_id = %request.correlation_id,
            processor = %processor,
            "processor reports payment already processed"
        );
        DispatchOutcome::AlreadyProcessed(processor)
    }
}
