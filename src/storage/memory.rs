use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::PaymentStore;
use crate::error::StoreError;

/// Process-local store backed by a [`DashMap`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    records: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.records.get(key).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn upsert(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), value);
        Ok(())
    }

    async fn scan_all(&self) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        Ok(self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }
}
