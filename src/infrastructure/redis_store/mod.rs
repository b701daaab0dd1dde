use anyhow::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::application::rate_limit::CounterStore;
use crate::application::usecases::connect::StateStore;

pub async fn establish_connection(redis_url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;
    Ok(manager)
}

/// Redis-backed store for short-lived OAuth state and rate-limit counters.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn put(&self, key: String, value: String, ttl_seconds: u64) -> Result<()> {
        let mut connection = self.connection.clone();

        redis::cmd("SETEX")
            .arg(&key)
            .arg(ttl_seconds)
            .arg(&value)
            .query_async::<_, ()>(&mut connection)
            .await?;

        Ok(())
    }

    /// Atomic read-and-delete so each state token is redeemable once.
    async fn take(&self, key: String) -> Result<Option<String>> {
        let mut connection = self.connection.clone();

        let value = redis::cmd("GETDEL")
            .arg(&key)
            .query_async::<_, Option<String>>(&mut connection)
            .await?;

        Ok(value)
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn get(&self, key: String) -> Result<Option<u64>> {
        let mut connection = self.connection.clone();

        let value = redis::cmd("GET")
            .arg(&key)
            .query_async::<_, Option<u64>>(&mut connection)
            .await?;

        Ok(value)
    }

    async fn increment_with_ttl(&self, key: String, ttl_seconds: u64) -> Result<u64> {
        let mut connection = self.connection.clone();

        let (count, _): (u64, i64) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&key)
            .cmd("EXPIRE")
            .arg(&key)
            .arg(ttl_seconds)
            .arg("NX")
            .query_async(&mut connection)
            .await?;

        Ok(count)
    }

    async fn ttl_seconds(&self, key: String) -> Result<Option<u64>> {
        let mut connection = self.connection.clone();

        let ttl = redis::cmd("TTL")
            .arg(&key)
            .query_async::<_, i64>(&mut connection)
            .await?;

        if ttl < 0 {
            return Ok(None);
        }

        Ok(Some(ttl as u64))
    }
}
