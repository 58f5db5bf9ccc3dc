//! Remote cache backend. TTL lives on the Redis key itself; there is no
//! separate capacity cap (Redis' own eviction policy governs that).
//!
//! Grounded on `proerror77-Nova/backend/libs/nova-cache/src/lib.rs`'s
//! `NovaCache` (`ConnectionManager` behind a `tokio::sync::Mutex`, `set_ex`
//! for TTL writes).

use super::{FeedCache, DEFAULT_TTL};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

pub struct RedisCache {
    connection: Arc<Mutex<ConnectionManager>>,
    ttl: Duration,
}

impl RedisCache {
    pub async fn connect(connection_string: &str) -> redis::RedisResult<Self> {
        Self::connect_with_ttl(connection_string, DEFAULT_TTL).await
    }

    pub async fn connect_with_ttl(connection_string: &str, ttl: Duration) -> redis::RedisResult<Self> {
        let client = redis::Client::open(connection_string)?;
        let connection = client.get_connection_manager().await?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            ttl,
        })
    }
}

#[async_trait]
impl FeedCache for RedisCache {
    async fn get(&self, url: &str) -> Option<Vec<u8>> {
        let mut conn = self.connection.lock().await;
        match conn.get::<_, Option<Vec<u8>>>(url).await {
            Ok(value) => value,
            Err(error) => {
                warn!(url, %error, "redis cache get failed");
                None
            }
        }
    }

    async fn set(&self, url: &str, value: Vec<u8>) {
        let mut conn = self.connection.lock().await;
        if let Err(error) = conn
            .set_ex::<_, _, ()>(url, value, self.ttl.as_secs())
            .await
        {
            warn!(url, %error, "redis cache set failed");
        }
    }
}
