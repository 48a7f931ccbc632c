//! Cache Service
//!
//! Generic cache trait and Redis implementation. Values are stored as JSON.
//!
//! # Example
//!
//! ```rust,ignore
//! use shop_server::infrastructure::cache::{Cache, RedisCache};
//!
//! let cache = RedisCache::with_prefix(redis_connection, "shop:");
//! cache.set_ex("catalog:categories", &categories, 300).await?;
//! let cached: Option<Vec<Category>> = cache.get("catalog:categories").await?;
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::shared::error::AppError;

/// Key/value cache with expiring JSON entries and counters.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Get a value, `None` on a miss.
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Store a value that expires after `seconds`.
    async fn set_ex<T: Serialize + Sync + Send>(
        &self,
        key: &str,
        value: &T,
        seconds: u64,
    ) -> Result<(), AppError>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Atomically increment a counter, creating it at 1.
    async fn incr(&self, key: &str) -> Result<i64, AppError>;
}

/// Redis-backed cache.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    /// Optional key prefix for namespacing
    prefix: Option<Arc<str>>,
}

impl RedisCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, prefix: None }
    }

    /// All keys are prefixed, e.g. `"shop:"` turns `catalog:categories`
    /// into `shop:catalog:categories`.
    pub fn with_prefix(conn: ConnectionManager, prefix: impl Into<Arc<str>>) -> Self {
        Self {
            conn,
            prefix: Some(prefix.into()),
        }
    }

    fn format_key(&self, key: &str) -> String {
        prefixed(self.prefix.as_deref(), key)
    }
}

fn prefixed(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{}", prefix, key),
        None => key.to_string(),
    }
}

pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|e| {
        warn!("Cache serialization error: {}", e);
        AppError::Internal(format!("Cache serialization failed: {}", e))
    })
}

pub(crate) fn deserialize<T: DeserializeOwned>(data: &str) -> Result<T, AppError> {
    serde_json::from_str(data).map_err(|e| {
        warn!("Cache deserialization error: {}", e);
        AppError::Internal(format!("Cache deserialization failed: {}", e))
    })
}

#[async_trait]
impl Cache for RedisCache {
    #[instrument(skip(self), level = "debug")]
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let result: Option<String> = conn.get(&full_key).await?;

        match result {
            Some(data) => {
                debug!(key = %full_key, "Cache hit");
                Ok(Some(deserialize(&data)?))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_ex<T: Serialize + Sync + Send>(
        &self,
        key: &str,
        value: &T,
        seconds: u64,
    ) -> Result<(), AppError> {
        let full_key = self.format_key(key);
        let data = serialize(value)?;
        let mut conn = self.conn.clone();

        let _: () = conn.set_ex(&full_key, data, seconds).await?;
        debug!(key = %full_key, ttl = seconds, "Cache set with expiry");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let deleted: u64 = conn.del(&full_key).await?;
        debug!(key = %full_key, deleted = deleted > 0, "Cache delete");

        Ok(deleted > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn incr(&self, key: &str) -> Result<i64, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let value: i64 = conn.incr(&full_key, 1).await?;
        debug!(key = %full_key, value = value, "Cache increment");

        Ok(value)
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// In-process cache used by service tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryCache {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

#[cfg(test)]
#[async_trait]
impl Cache for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, AppError> {
        let data = self.entries.lock().unwrap().get(key).cloned();
        data.map(|d| deserialize(&d)).transpose()
    }

    async fn set_ex<T: Serialize + Sync + Send>(
        &self,
        key: &str,
        value: &T,
        _seconds: u64,
    ) -> Result<(), AppError> {
        let data = serialize(value)?;
        self.entries.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn incr(&self, key: &str) -> Result<i64, AppError> {
        let mut entries = self.entries.lock().unwrap();
        let next = entries
            .get(key)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
            + 1;
        entries.insert(key.to_string(), next.to_string());
        Ok(next)
    }
}
