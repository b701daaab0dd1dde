use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::webhook_events::{InsertWebhookEventEntity, WebhookEventEntity},
        repositories::webhook_events::WebhookEventRepository,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::webhook_events},
};

pub struct WebhookEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WebhookEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WebhookEventRepository for WebhookEventPostgres {
    async fn find_by_event_id(
        &self,
        stripe_event_id: String,
    ) -> Result<Option<WebhookEventEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = webhook_events::table
            .filter(webhook_events::stripe_event_id.eq(stripe_event_id))
            .select(WebhookEventEntity::as_select())
            .first::<WebhookEventEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn insert(
        &self,
        insert_webhook_event_entity: InsertWebhookEventEntity,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(webhook_events::table)
            .values(&insert_webhook_event_entity)
            .returning(webhook_events::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn mark_processed(&self, webhook_event_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(webhook_events::table)
            .filter(webhook_events::id.eq(webhook_event_id))
            .set((
                webhook_events::processed.eq(true),
                webhook_events::processed_at.eq(Some(Utc::now())),
                webhook_events::error.eq(None::<String>),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn record_error(&self, webhook_event_id: Uuid, error: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(webhook_events::table)
            .filter(webhook_events::id.eq(webhook_event_id))
            .set(webhook_events::error.eq(Some(error)))
            .execute(&mut conn)?;

        Ok(())
    }
}
