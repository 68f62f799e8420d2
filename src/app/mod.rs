use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::{self, dead_letters, metrics, payments, payments_summary};
use crate::queue::worker::InFlight;
use crate::queue::{DeadLetters, PaymentQueue, WorkerContext, WorkerPool};
use crate::services::{
    AtomicMetrics, PaymentDispatcher, PaymentGateway, PaymentProcessorClient, PaymentService,
};
use crate::storage::{InMemoryStore, PaymentStore};

pub mod config;

use config::Config;

/// A running pipeline: the facade handed to the router plus the workers
/// draining its queue.
pub struct App {
    pub service: Arc<PaymentService>,
    pub workers: WorkerPool,
}

impl App {
    /// Wires queue, dispatcher and workers around the given gateway and store.
    pub fn assemble(
        config: &Config,
        gateway: Arc<dyn PaymentGateway>,
        store: Arc<dyn PaymentStore>,
    ) -> Self {
        let metrics = Arc::new(AtomicMetrics::new());
        let dead_letters = Arc::new(DeadLetters::new(config.dead_letter_capacity));
        let queue = Arc::new(PaymentQueue::new(config.queue_buffer_size, config.queue_overflow));
        let dispatcher = Arc::new(PaymentDispatcher::new(
            gateway.clone(),
            store.clone(),
            metrics.clone(),
        ));

        let context = Arc::new(WorkerContext {
            queue: queue.clone(),
            dispatcher,
            retry: config.retry_policy(),
            metrics: metrics.clone(),
            dead_letters: dead_letters.clone(),
            in_flight: InFlight::new(),
        });
        let workers = WorkerPool::spawn(config.workers(), context);

        let service = Arc::new(PaymentService::new(queue, store, gateway, metrics, dead_letters));
        Self { service, workers }
    }

    /// Builds the HTTP gateway and the configured store, then assembles.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let gateway = Arc::new(PaymentProcessorClient::from_config(config)?);
        let store = open_store(config).await?;
        let app = Self::assemble(config, gateway, store);
        info!(
            workers = app.workers.len(),
            queue_capacity = config.queue_buffer_size,
            overflow = ?config.queue_overflow,
            "payment pipeline started"
        );
        Ok(app)
    }

    pub fn router(&self) -> Router {
        build_router(self.service.clone())
    }
}

pub fn build_router(service: Arc<PaymentService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments", post(payments::create_payment))
        .route("/payments-summary", get(payments_summary::get_summary))
        .route("/metrics", get(metrics::get_metrics))
        .route("/dead-letters", get(dead_letters::list_dead_letters))
        .with_state(service)
}

#[cfg(feature = "storage-redis")]
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PaymentStore>> {
    match &config.redis_url {
        Some(url) => {
            let store =
                crate::storage::RedisStore::connect(url, config.payment_table_hash.clone()).await?;
            info!(hash = %config.payment_table_hash, "using redis payment store");
            Ok(Arc::new(store))
        }
        None => {
            info!("REDIS_URL not set, using in-memory payment store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

#[cfg(not(feature = "storage-redis"))]
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn PaymentStore>> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL ignored: built without the storage-redis feature");
    }
    Ok(Arc::new(InMemoryStore::new()))
}
