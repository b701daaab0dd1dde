use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::payment_history;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_history)]
pub struct PaymentHistoryEntity {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub stripe_invoice_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub amount_minor: i32,
    pub currency: String,
    pub status: String,
    pub description: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_history)]
pub struct InsertPaymentHistoryEntity {
    pub subscription_id: Uuid,
    pub stripe_invoice_id: Option<String>,
    pub stripe_payment_intent_id: Option<String>,
    pub amount_minor: i32,
    pub currency: String,
    pub status: String,
    pub description: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}
