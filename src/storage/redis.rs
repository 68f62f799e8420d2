use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;

use super::PaymentStore;
use crate::error::StoreError;

/// Records kept in a single Redis hash (`HSET hash id record`).
///
/// One multiplexed connection is opened at startup and cloned per command.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    hash: String,
}

impl RedisStore {
    pub async fn connect(url: &str, hash: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        Ok(Self {
            conn,
            hash: hash.into(),
        })
    }
}

#[async_trait]
impl PaymentStore for RedisStore {
    async fn upsert(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(&self.hash, key, value).await?;
        Ok(())
    }

    async fn scan_all(&self) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let records: HashMap<String, Vec<u8>> = conn.hgetall(&self.hash).await?;
        Ok(records)
    }
}
