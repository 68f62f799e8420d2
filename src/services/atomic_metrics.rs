use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::Processor;

#[derive(Debug, Default)]
pub struct AtomicMetrics {
    submitted: AtomicU64,
    rejected: AtomicU64,
    processed_default: AtomicU64,
    processed_fallback: AtomicU64,
    already_processed: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
    persistence_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub rejected: u64,
    pub processed_default: u64,
    pub processed_fallback: u64,
    pub already_processed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub persistence_failures: u64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_processed(&self, processor: Processor) {
        let counter = match processor {
            Processor::Default => &self.processed_default,
            Processor::Fallback => &self.processed_fallback,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_already_processed(&self) {
        self.already_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_persistence_failures(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            processed_default: self.processed_default.load(Ordering::Relaxed),
            processed_fallback: self.processed_fallback.load(Ordering::Relaxed),
            already_processed: self.already_processed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
        }
    }
}
