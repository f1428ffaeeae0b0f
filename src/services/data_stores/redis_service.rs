use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::sync::OnceCell;

use crate::domain::{KeyTtl, KeyValueStore, ScanPage, StoreError};

// Small helper to shorten CRUD error mapping
fn crud<E: ToString>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Redis-backed [`KeyValueStore`].
///
/// One managed connection is opened on first use and shared by every call;
/// it reconnects on its own after the link drops. Every call, connection
/// setup included, is bounded by the configured timeout so a stalled
/// instance degrades callers instead of blocking them.
pub struct RedisService {
    client: Client,
    conn: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl RedisService {
    /// `host_url` is `host:port`; no connection is made until first use.
    pub fn new(host_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let formatted_url = format!("redis://{}/", host_url);
        let client =
            Client::open(formatted_url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            timeout,
        })
    }

    // A failed or timed-out setup leaves the cell empty, so the next call retries
    async fn get_connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .conn
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))
            })
            .await?;
        Ok(manager.clone())
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisService {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let value: Option<String> = conn.get(key).await.map_err(crud)?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let _: () = conn.set(key, value).await.map_err(crud)?;
            Ok(())
        })
        .await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        // Clamp TTL to at least 1 second to avoid immediate expiration
        let ttl = ttl_secs.max(1);
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let _: () = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl)
                .query_async(&mut conn)
                .await
                .map_err(crud)?;
            Ok(())
        })
        .await
    }

    async fn set_nx_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<bool, StoreError> {
        let ttl = ttl_secs.max(1);
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            // Nil reply when the key already exists
            let reply: redis::Value = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("NX")
                .arg("EX")
                .arg(ttl)
                .query_async(&mut conn)
                .await
                .map_err(crud)?;
            Ok(!matches!(reply, redis::Value::Nil))
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let found: bool = conn.exists(key).await.map_err(crud)?;
            Ok(found)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let deleted: i64 = conn.del(key).await.map_err(crud)?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let count: i64 = conn.incr(key, 1).await.map_err(crud)?;
            Ok(count)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let ttl = ttl_secs.max(1);
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let applied: bool = redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl)
                .query_async(&mut conn)
                .await
                .map_err(crud)?;
            Ok(applied)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let reply: i64 = conn.ttl(key).await.map_err(crud)?;
            Ok(KeyTtl::from_redis(reply))
        })
        .await
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage, StoreError> {
        self.bounded(async {
            let mut conn = self.get_connection().await?;
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(count.max(1))
                .query_async(&mut conn)
                .await
                .map_err(crud)?;
            Ok(ScanPage { cursor: next, keys })
        })
        .await
    }
}
