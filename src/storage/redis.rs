use redis::{aio::MultiplexedConnection, Client};
use std::sync::{Arc, OnceLock};

use crate::storage::StorageError;

pub static REDIS_CLIENT: OnceLock<RedisClient> = OnceLock::new();

#[derive(Clone)]
pub struct RedisClient {
    inner: Arc<redis::Client>,
}

impl RedisClient {
    pub async fn init(url: &str) -> Result<(), StorageError> {
        if REDIS_CLIENT.get().is_some() {
            info!("RedisClient already initialized");
            return Ok(());
        }

        info!("Initializing RedisClient...");
        let redis = Arc::new(Client::open(url)?);

        let mut conn = redis.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(StorageError::Redis("Redis connection test failed".to_string()));
        }
        info!("RedisClient initialized");

        REDIS_CLIENT
            .set(Self { inner: redis })
            .map_err(|_| StorageError::Redis("Failed to set global Redis client".to_string()))
    }

    pub fn get() -> Result<&'static RedisClient, StorageError> {
        REDIS_CLIENT
            .get()
            .ok_or_else(|| StorageError::Redis("Redis client not initialized".to_string()))
    }

    pub async fn get_connection(&self) -> Result<MultiplexedConnection, StorageError> {
        let conn = self.inner.get_multiplexed_async_connection().await?;
        Ok(conn)
    }
}
