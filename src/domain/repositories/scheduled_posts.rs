use anyhow::Result;
use axum::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::scheduled_posts::{InsertScheduledPostEntity, ScheduledPostEntity};
use crate::domain::value_objects::scheduling_model::QueueAnalyticsDto;

#[async_trait]
#[automock]
pub trait ScheduledPostRepository {
    async fn create(
        &self,
        insert_scheduled_post_entity: InsertScheduledPostEntity,
    ) -> Result<Uuid>;
    async fn find_by_id(&self, scheduled_post_id: Uuid) -> Result<ScheduledPostEntity>;
    async fn find_by_id_for_user(
        &self,
        scheduled_post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ScheduledPostEntity>>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ScheduledPostEntity>>;
    /// Pending rows whose scheduled_for is at or before `now`.
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPostEntity>>;
    async fn mark_posted(
        &self,
        scheduled_post_id: Uuid,
        x_post_id: String,
        posted_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn mark_failed(&self, scheduled_post_id: Uuid, error_message: String) -> Result<()>;
    async fn reschedule(
        &self,
        scheduled_post_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> Result<()>;
    async fn delete(&self, scheduled_post_id: Uuid) -> Result<()>;
    async fn queue_analytics(&self, user_id: Uuid) -> Result<QueueAnalyticsDto>;
}
