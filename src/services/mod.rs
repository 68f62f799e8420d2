pub mod atomic_metrics;
pub mod circuit_breaker;
pub mod dispatcher;
pub mod payment_processor_client;
pub mod payment_service;
pub mod summary;

pub use atomic_metrics::AtomicMetrics;
pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitBreakerState};
pub use dispatcher::{DispatchOutcome, PaymentDispatcher};
pub use payment_processor_client::{PaymentGateway, PaymentProcessorClient, ProcessorOutcome};
pub use payment_service::{PaymentService, SummaryFilters};
pub use summary::{SummaryAggregator, TimeWindow};
