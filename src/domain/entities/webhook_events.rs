use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::webhook_events;

/// Idempotency ledger row, one per provider event id.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = webhook_events)]
pub struct WebhookEventEntity {
    pub id: Uuid,
    pub stripe_event_id: String,
    pub event_type: String,
    pub processed: bool,
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = webhook_events)]
pub struct InsertWebhookEventEntity {
    pub stripe_event_id: String,
    pub event_type: String,
    pub processed: bool,
}
