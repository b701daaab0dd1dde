use anyhow::Result;
use axum::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::webhook_events::{InsertWebhookEventEntity, WebhookEventEntity};

#[async_trait]
#[automock]
pub trait WebhookEventRepository {
    async fn find_by_event_id(
        &self,
        stripe_event_id: String,
    ) -> Result<Option<WebhookEventEntity>>;
    async fn insert(&self, insert_webhook_event_entity: InsertWebhookEventEntity) -> Result<Uuid>;
    async fn mark_processed(&self, webhook_event_id: Uuid) -> Result<()>;
    async fn record_error(&self, webhook_event_id: Uuid, error: String) -> Result<()>;
}
