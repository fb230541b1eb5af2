//! Redis list used as the frontier's durable spillover.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{OverflowStore, StoreError};

/// FIFO via `RPUSH` at the tail and `LPOP` at the head, all under one
/// well-known key.
#[derive(Clone)]
pub struct RedisOverflow {
    conn: ConnectionManager,
    key: String,
}

impl RedisOverflow {
    /// Connect and verify the server responds.
    pub async fn connect(url: &str, key: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self {
            conn,
            key: key.to_string(),
        })
    }
}

impl OverflowStore for RedisOverflow {
    async fn push(&self, url: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(&self.key, url).await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let url: Option<String> = conn.lpop(&self.key, None).await?;
        Ok(url)
    }
}
