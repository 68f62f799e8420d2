use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::models::PaymentRequest;
use crate::queue::payment_queue::{PaymentQueue, QueuedPayment};
use crate::services::atomic_metrics::AtomicMetrics;
use crate::services::dispatcher::PaymentDispatcher;

const IN_FLIGHT_RECHECK_DELAY: Duration = Duration::from_millis(5);

/// How often, and how patiently, a payment that failed on both processors
/// is sent back through the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// `base * 2^(attempts - 1)` capped at `max_delay`, with ±50% jitter.
    pub fn backoff(&self, attempts: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = attempts.saturating_sub(1).min(20);
        let delay = self.base_delay.saturating_mul(1u32 << exponent).min(self.max_delay);
        let jitter: f64 = rand::thread_rng().gen_range(0.5..=1.5);
        delay.mul_f64(jitter).min(self.max_delay)
    }

    /// Wait before looking again at a correlation id that another worker is
    /// dispatching. Never zero, so a deferred duplicate cannot spin.
    pub fn recheck_delay(&self) -> Duration {
        self.backoff(1).max(IN_FLIGHT_RECHECK_DELAY)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    #[serde(flatten)]
    pub request: PaymentRequest,
    pub attempts: u32,
    pub reason: String,
    #[serde(rename = "deadLetteredAt")]
    pub dead_lettered_at: DateTime<Utc>,
}

/// Most recent payments that ran out of dispatch attempts, oldest evicted
/// first once `capacity` is reached.
#[derive(Debug)]
pub struct DeadLetters {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl DeadLetters {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn push(&self, letter: DeadLetter) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            if let Some(evicted) = entries.pop_front() {
                debug!(
                    correlation_id = %evicted.request.correlation_id,
                    "evicting oldest dead letter"
                );
            }
        }
        entries.push_back(letter);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.entries.lock().iter().cloned().collect()
    }
}

/// Correlation ids currently being dispatched by some worker.
#[derive(Debug, Default)]
pub struct InFlight {
    ids: DashMap<String, ()>,
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    id: String,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another worker holds `id`.
    pub fn try_acquire(&self, id: &str) -> Option<InFlightGuard<'_>> {
        match self.ids.entry(id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(());
                Some(InFlightGuard {
                    owner: self,
                    id: id.to_string(),
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.ids.remove(&self.id);
    }
}

/// Everything a worker needs; shared by all workers of a pool.
pub struct WorkerContext {
    pub queue: Arc<PaymentQueue>,
    pub dispatcher: Arc<PaymentDispatcher>,
    pub retry: RetryPolicy,
    pub metrics: Arc<AtomicMetrics>,
    pub dead_letters: Arc<DeadLetters>,
    pub in_flight: InFlight,
}

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(workers: usize, context: Arc<WorkerContext>) -> Self {
        let handles = (0..workers.max(1))
            .map(|id| {
                let context = context.clone();
                tokio::spawn(async move { run_worker(id, context).await })
            })
            .collect();
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stops every worker. In-flight dispatches are dropped.
    pub async fn shutdown(self) {
        for handle in &self.handles {
            handle.abort();
        }
        futures::future::join_all(self.handles).await;
    }
}

/// Runs until the pool aborts it; the queue keeps its own sender, so
/// `dequeue` never reports a closed channel.
async fn run_worker(id: usize, context: Arc<WorkerContext>) {
    debug!(worker = id, "payment worker started");

    while let Some(mut item) = context.queue.dequeue().await {
        let Some(_guard) = context.in_flight.try_acquire(&item.request.correlation_id) else {
            // Same id is mid-dispatch elsewhere; look at it again later.
            context.queue.requeue_after(item, context.retry.recheck_delay());
            continue;
        };

        match context.dispatcher.dispatch(&item.request).await {
            Ok(_) => {}
            Err(e) if e.is_retryable() => {
                item.attempts += 1;
                if context.retry.is_exhausted(item.attempts) {
                    dead_letter(&context, item, e.to_string());
                } else {
                    context.metrics.increment_retried();
                    let delay = context.retry.backoff(item.attempts);
                    context.queue.requeue_after(item, delay);
                }
            }
            // Persistence failures are logged by the dispatcher and never re-dispatched.
            Err(_) => {}
        }
    }
}

fn dead_letter(context: &WorkerContext, item: QueuedPayment, reason: String) {
    warn!(
        correlation_id = %item.request.correlation_id,
        attempts = item.attempts,
        reason = %reason,
        "payment moved to dead letters"
    );
    context.dead_letters.push(DeadLetter {
        request: item.request,
        attempts: item.attempts,
        reason,
        dead_lettered_at: Utc::now(),
    });
    context.metrics.increment_dead_lettered();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::OverflowPolicy;
    use crate::models::{Processor, StoredPayment};
    use crate::services::dispatcher::tests::{Scripted, ScriptedGateway};
    use crate::storage::InMemoryStore;
    use rust_decimal_macros::dec;

    fn policy(max_attempts: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    fn context(
        gateway: Arc<ScriptedGateway>,
        store: InMemoryStore,
        retry: RetryPolicy,
    ) -> Arc<WorkerContext> {
        let metrics = Arc::new(AtomicMetrics::new());
        Arc::new(WorkerContext {
            queue: Arc::new(PaymentQueue::new(16, OverflowPolicy::Block)),
            dispatcher: Arc::new(PaymentDispatcher::new(gateway, Arc::new(store), metrics.clone())),
            retry,
            metrics,
            dead_letters: Arc::new(DeadLetters::new(8)),
            in_flight: InFlight::new(),
        })
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_backoff_bounds() {
        let retry = RetryPolicy {
            max_attempts: Some(3),
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
        };

        let first = retry.backoff(1);
        assert!(first >= Duration::from_millis(5) && first <= Duration::from_millis(15));
        assert!(retry.backoff(30) <= Duration::from_millis(100));

        let instant = RetryPolicy {
            base_delay: Duration::ZERO,
            ..retry.clone()
        };
        assert_eq!(instant.backoff(7), Duration::ZERO);
        assert_eq!(instant.recheck_delay(), IN_FLIGHT_RECHECK_DELAY);
        assert!(retry.recheck_delay() >= Duration::from_millis(5));

        assert!(!retry.is_exhausted(2));
        assert!(retry.is_exhausted(3));
        assert!(!policy(None).is_exhausted(u32::MAX));
    }

    #[test]
    fn test_in_flight_guard() {
        let in_flight = InFlight::new();
        let guard = in_flight.try_acquire("abc").unwrap();
        assert!(in_flight.try_acquire("abc").is_none());
        assert!(in_flight.try_acquire("other").is_some());

        drop(guard);
        assert!(in_flight.is_empty());
        assert!(in_flight.try_acquire("abc").is_some());
    }

    #[test]
    fn test_dead_letters_keep_the_most_recent() {
        let letters = DeadLetters::new(2);
        for id in ["a", "b", "c"] {
            letters.push(DeadLetter {
                request: PaymentRequest::new(id, dec!(1)),
                attempts: 1,
                reason: "both processors failed".into(),
                dead_lettered_at: Utc::now(),
            });
        }

        let ids: Vec<_> = letters
            .snapshot()
            .into_iter()
            .map(|l| l.request.correlation_id)
            .collect();
        assert_eq!(ids, ["b", "c"]);
        assert_eq!(letters.len(), 2);
        assert_eq!(DeadLetters::new(0).capacity(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_a_processor_accepts() {
        let gateway = Arc::new(
            ScriptedGateway::default()
                .with(Processor::Fallback, &[Scripted::Fail, Scripted::Fail, Scripted::Accept]),
        );
        let store = InMemoryStore::new();
        let ctx = context(gateway.clone(), store.clone(), policy(Some(10)));
        let pool = WorkerPool::spawn(2, ctx.clone());

        ctx.queue.enqueue(PaymentRequest::new("abc", dec!(19.90))).await.unwrap();
        wait_until(|| !store.is_empty()).await;

        let record = StoredPayment::from_slice(&store.get("abc").unwrap()).unwrap();
        assert_eq!(record.processor(), Some(Processor::Fallback));
        assert_eq!(ctx.metrics.snapshot().retried, 2);
        assert_eq!(gateway.calls_to(Processor::Default), 3);
        assert!(ctx.dead_letters.is_empty());

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_exhausted_payment_is_dead_lettered() {
        let gateway = Arc::new(ScriptedGateway::default());
        let store = InMemoryStore::new();
        let ctx = context(gateway.clone(), store.clone(), policy(Some(3)));
        let pool = WorkerPool::spawn(1, ctx.clone());

        ctx.queue.enqueue(PaymentRequest::new("doomed", dec!(1))).await.unwrap();
        wait_until(|| ctx.dead_letters.len() == 1).await;

        let letters = ctx.dead_letters.snapshot();
        assert_eq!(letters[0].request.correlation_id, "doomed");
        assert_eq!(letters[0].attempts, 3);
        assert_eq!(gateway.calls_to(Processor::Default), 3);
        assert_eq!(gateway.calls_to(Processor::Fallback), 3);
        assert!(store.is_empty());
        assert!(ctx.queue.is_empty());

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_submissions_settle_once() {
        let gateway = Arc::new(
            ScriptedGateway::default()
                .with(Processor::Default, &[Scripted::Accept, Scripted::Conflict]),
        );
        let store = InMemoryStore::new();
        let ctx = context(gateway.clone(), store.clone(), policy(Some(10)));
        let pool = WorkerPool::spawn(4, ctx.clone());

        ctx.queue.enqueue(PaymentRequest::new("dup", dec!(2))).await.unwrap();
        ctx.queue.enqueue(PaymentRequest::new("dup", dec!(2))).await.unwrap();
        wait_until(|| ctx.metrics.snapshot().already_processed == 1).await;

        assert_eq!(store.len(), 1);
        assert_eq!(ctx.metrics.snapshot().processed_default, 1);

        pool.shutdown().await;
    }
}
