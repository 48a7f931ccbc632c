//! Cache Module
//!
//! Redis connection management and the `Cache` abstraction used by the
//! catalog. The same connection manager backs the rate limiter.

mod cache_service;

pub use cache_service::{Cache, RedisCache};

#[cfg(test)]
pub use cache_service::MemoryCache;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Prefix applied to every key written through `RedisCache`.
pub const KEY_PREFIX: &str = "shop:";

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache keys and TTLs.
///
/// Product listings embed a version number; bumping the version key
/// invalidates every cached page at once.
pub mod keys {
    use std::fmt::Display;

    /// Seconds a product listing page stays cached.
    pub const PRODUCT_LIST_TTL: u64 = 60;

    /// Seconds the category list stays cached.
    pub const CATEGORIES_TTL: u64 = 300;

    pub const PRODUCTS_VERSION: &str = "catalog:products:version";

    pub const CATEGORIES: &str = "catalog:categories";

    /// Prefix for rate limiting windows (e.g., "ratelimit:auth:1.2.3.4")
    pub const RATE_LIMIT: &str = "ratelimit:";

    #[inline]
    pub fn product_list(version: i64, fragment: impl Display) -> String {
        format!("catalog:products:v{}:{}", version, fragment)
    }

    #[inline]
    pub fn rate_limit(bucket: &str, client: impl Display) -> String {
        format!("{}{}:{}", RATE_LIMIT, bucket, client)
    }
}
