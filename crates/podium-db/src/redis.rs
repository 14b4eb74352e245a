//! Redis cache backend.
//!
//! Implements the engine's [`CacheBackend`] over a [`fred`] client. The
//! cache is strictly optional at runtime: the engine's cache layer treats
//! every error returned here as a miss, so a Redis outage degrades reads
//! to direct computation rather than failing requests.

use core::future::Future;
use std::time::Duration;

use fred::prelude::*;

use podium_engine::{CacheBackend, CacheError};

use crate::error::DbError;

/// Connection handle to a Redis instance, usable as the engine's cache
/// backend.
#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    /// Connect to Redis at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Redis`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config =
            Config::from_url(url).map_err(|e| DbError::Config(format!("Invalid Redis URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Redis");
        Ok(Self { client })
    }

    /// Return a reference to the underlying [`Client`].
    pub const fn client(&self) -> &Client {
        &self.client
    }
}

impl CacheBackend for RedisCache {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, CacheError>> + Send {
        async move {
            let value: Option<String> = self.client.get(key).await.map_err(backend_err)?;
            Ok(value)
        }
    }

    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send {
        async move {
            let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            let _: () = self
                .client
                .set(key, value, Some(Expiration::PX(millis)), None, false)
                .await
                .map_err(backend_err)?;
            Ok(())
        }
    }

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), CacheError>> + Send {
        async move {
            let _: u32 = self.client.del(key).await.map_err(backend_err)?;
            Ok(())
        }
    }

    fn ping(&self) -> impl Future<Output = Result<(), CacheError>> + Send {
        async move {
            let _: String = self.client.ping(None).await.map_err(backend_err)?;
            Ok(())
        }
    }
}

/// Collapse a [`fred`] error into the engine's cache error.
fn backend_err(err: fred::error::Error) -> CacheError {
    CacheError::Backend(err.to_string())
}
