use std::sync::Arc;

use anyhow::Result;
use axum::async_trait;
use mockall::automock;
use uuid::Uuid;

pub const X_POST_LIMIT: u64 = 100;
pub const X_POST_WINDOW_SECONDS: u64 = 900;
pub const RESCHEDULE_BACKOFF_SECONDS: i64 = 60;

pub fn x_post_key(user_id: Uuid) -> String {
    format!("rate_limit:user_{}:x_posts", user_id)
}

#[async_trait]
#[automock]
pub trait CounterStore {
    async fn get(&self, key: String) -> Result<Option<u64>>;
    /// Increments the counter and starts the window on first hit.
    async fn increment_with_ttl(&self, key: String, ttl_seconds: u64) -> Result<u64>;
    async fn ttl_seconds(&self, key: String) -> Result<Option<u64>>;
}

/// Fixed-window counter over the posting allowance for one account.
pub struct RateLimiter<T>
where
    T: CounterStore + Send + Sync,
{
    counter_store: Arc<T>,
}

impl<T> RateLimiter<T>
where
    T: CounterStore + Send + Sync,
{
    pub fn new(counter_store: Arc<T>) -> Self {
        Self { counter_store }
    }

    pub async fn check(&self, user_id: Uuid) -> Result<bool> {
        let count = self
            .counter_store
            .get(x_post_key(user_id))
            .await?
            .unwrap_or(0);

        Ok(count < X_POST_LIMIT)
    }

    pub async fn increment(&self, user_id: Uuid) -> Result<u64> {
        self.counter_store
            .increment_with_ttl(x_post_key(user_id), X_POST_WINDOW_SECONDS)
            .await
    }

    pub async fn remaining(&self, user_id: Uuid) -> Result<u64> {
        let count = self
            .counter_store
            .get(x_post_key(user_id))
            .await?
            .unwrap_or(0);

        Ok(X_POST_LIMIT.saturating_sub(count))
    }

    /// Seconds until the current window expires. Falls back to the full
    /// window when the key has no TTL yet.
    pub async fn time_to_reset(&self, user_id: Uuid) -> Result<u64> {
        let ttl = self
            .counter_store
            .ttl_seconds(x_post_key(user_id))
            .await?
            .unwrap_or(X_POST_WINDOW_SECONDS);

        Ok(ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn check_allows_under_limit() {
        let mut counter_store = MockCounterStore::new();
        counter_store
            .expect_get()
            .returning(|_| Box::pin(async { Ok(Some(X_POST_LIMIT - 1)) }));

        let rate_limiter = RateLimiter::new(Arc::new(counter_store));
        let user_id = Uuid::new_v4();

        assert!(rate_limiter.check(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn check_blocks_at_limit() {
        let mut counter_store = MockCounterStore::new();
        counter_store
            .expect_get()
            .returning(|_| Box::pin(async { Ok(Some(X_POST_LIMIT)) }));

        let rate_limiter = RateLimiter::new(Arc::new(counter_store));
        let user_id = Uuid::new_v4();

        assert!(!rate_limiter.check(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn missing_counter_means_full_allowance() {
        let mut counter_store = MockCounterStore::new();
        counter_store
            .expect_get()
            .returning(|_| Box::pin(async { Ok(None) }));

        let rate_limiter = RateLimiter::new(Arc::new(counter_store));
        let user_id = Uuid::new_v4();

        assert_eq!(rate_limiter.remaining(user_id).await.unwrap(), X_POST_LIMIT);
    }

    #[tokio::test]
    async fn time_to_reset_defaults_to_window() {
        let mut counter_store = MockCounterStore::new();
        counter_store
            .expect_ttl_seconds()
            .returning(|_| Box::pin(async { Ok(None) }));

        let rate_limiter = RateLimiter::new(Arc::new(counter_store));
        let user_id = Uuid::new_v4();

        assert_eq!(
            rate_limiter.time_to_reset(user_id).await.unwrap(),
            X_POST_WINDOW_SECONDS
        );
    }

    #[test]
    fn key_is_scoped_per_user() {
        let user_id = Uuid::new_v4();
        let key = x_post_key(user_id);

        assert!(key.starts_with("rate_limit:user_"));
        assert!(key.ends_with(":x_posts"));
        assert!(key.contains(&user_id.to_string()));
    }
}
