use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::app::config::Config;
use crate::error::AttemptFailure;
use crate::models::{PaymentRequest, Processor, ProcessorPayload};
use crate::services::circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitBreakerState};

/// Normalized result of one processor attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorOutcome {
    /// Accepted; carries the exact body that was sent.
    Accepted(Vec<u8>),
    /// The processor already holds this correlation id.
    Conflict,
    Failure(AttemptFailure),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn attempt(&self, request: &PaymentRequest, processor: Processor) -> ProcessorOutcome;

    fn circuit_state(&self, _processor: Processor) -> Option<CircuitBreakerState> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub base_url: Url,
    pub timeout: Duration,
    pub breaker: BreakerSettings,
}

struct ProcessorEndpoint {
    payments_url: String,
    client: Client,
    breaker: CircuitBreaker,
}

impl ProcessorEndpoint {
    fn new(settings: ProcessorSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .pool_max_idle_per_host(20) // Mantém conexões vivas
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            payments_url: format!("{}/payments", settings.base_url.as_str().trim_end_matches('/')),
            client,
            breaker: CircuitBreaker::new(settings.breaker),
        })
    }
}

/// HTTP gateway to the default and fallback processors, each behind its
/// own circuit breaker.
pub struct PaymentProcessorClient {
    default: ProcessorEndpoint,
    fallback: ProcessorEndpoint,
}

impl PaymentProcessorClient {
    pub fn new(
        default: ProcessorSettings,
        fallback: ProcessorSettings,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            default: ProcessorEndpoint::new(default)?,
            fallback: ProcessorEndpoint::new(fallback)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            config.processor_settings(Processor::Default),
            config.processor_settings(Processor::Fallback),
        )
    }

    fn endpoint(&self, processor: Processor) -> &ProcessorEndpoint {
        match processor {
            Processor::Default => &self.default,
            Processor::Fallback => &self.fallback,
        }
    }

    async fn send_request(
        endpoint: &ProcessorEndpoint,
        request: &PaymentRequest,
        processor: Processor,
    ) -> Result<Option<Vec<u8>>, AttemptFailure> {
        // requestedAt is stamped at send time, never at intake
        let payload = ProcessorPayload::new(request, processor, Utc::now());
        let body = serde_json::to_vec(&payload).map_err(|e| AttemptFailure::Encode(e.to_string()))?;

        let response = endpoint
            .client
            .post(&endpoint.payments_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone())
            .send()
            .await
            .map_err(classify_transport_error)?;

        classify_status(response.status()).map(|accepted| accepted.then_some(body))
    }
}

#[async_trait]
impl PaymentGateway for PaymentProcessorClient {
    async fn attempt(&self, request: &PaymentRequest, processor: Processor) -> ProcessorOutcome {
        let endpoint = self.endpoint(processor);
        let result = endpoint
            .breaker
            .execute(|| Self::send_request(endpoint, request, processor))
            .await;

        match result {
            Ok(Some(body)) => ProcessorOutcome::Accepted(body),
            Ok(None) => ProcessorOutcome::Conflict,
            Err(failure) => {
                debug!(
                    correlation_id = %request.correlation_id,
                    processor = %processor,
                    error = %failure,
                    "processor attempt failed"
                );
                ProcessorOutcome::Failure(failure)
            }
        }
    }

    fn circuit_state(&self, processor: Processor) -> Option<CircuitBreakerState> {
        Some(self.endpoint(processor).breaker.state())
    }
}

/// `Ok(true)` for 2xx, `Ok(false)` for the conflict statuses; both count as
/// success for the breaker.
fn classify_status(status: StatusCode) -> Result<bool, AttemptFailure> {
    if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
        Ok(false)
    } else if status.is_success() {
        Ok(true)
    } else {
        Err(AttemptFailure::Status(status.as_u16()))
    }
}

fn classify_transport_error(error: reqwest::Error) -> AttemptFailure {
    if error.is_timeout() {
        AttemptFailure::Timeout
    } else {
        AttemptFailure::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), Ok(true));
        assert_eq!(classify_status(StatusCode::CREATED), Ok(true));
        assert_eq!(classify_status(StatusCode::CONFLICT), Ok(false));
        assert_eq!(classify_status(StatusCode::UNPROCESSABLE_ENTITY), Ok(false));
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Err(AttemptFailure::Status(500))
        );
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), Err(AttemptFailure::Status(400)));
        assert_eq!(
            classify_status(StatusCode::MULTIPLE_CHOICES),
            Err(AttemptFailure::Status(300))
        );
    }

    #[test]
    fn test_payments_url_is_joined_once() {
        let settings = |url: &str| ProcessorSettings {
            base_url: Url::parse(url).unwrap(),
            timeout: Duration::from_millis(100),
            breaker: BreakerSettings {
                name: "t".into(),
                max_requests: 1,
                interval: Duration::ZERO,
                timeout: Duration::from_secs(1),
                failure_threshold: 1,
            },
        };

        let endpoint = ProcessorEndpoint::new(settings("http://localhost:8001")).unwrap();
        assert_eq!(endpoint.payments_url, "http://localhost:8001/payments");

        let endpoint = ProcessorEndpoint::new(settings("http://processor:8080/")).unwrap();
        assert_eq!(endpoint.payments_url, "http://processor:8080/payments");
    }
}
