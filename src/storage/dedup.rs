//! Redis-backed dedup claims.

use std::time::Duration;

use redis::aio::ConnectionManager;

use super::{DedupStore, StoreError};

/// Claims URLs via `SET key 1 NX EX ttl`, the one atomic admission gate
/// shared by every worker.
#[derive(Clone)]
pub struct RedisDedup {
    conn: ConnectionManager,
    prefix: String,
    ttl_secs: u64,
}

impl RedisDedup {
    /// Connect and verify the server responds.
    pub async fn connect(url: &str, prefix: &str, ttl: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            ttl_secs: ttl.as_secs().max(1),
        })
    }
}

impl DedupStore for RedisDedup {
    async fn claim(&self, url: &str) -> Result<bool, StoreError> {
        let key = format!("{}{}", self.prefix, url);
        let mut conn = self.conn.clone();

        // SET NX is atomic at the server: true only when the key was created.
        let created: bool = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;
        Ok(created)
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        Ok(())
    }
}
