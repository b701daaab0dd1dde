use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::plan_types::PlanType;
use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
use crate::infrastructure::postgres::schema::subscriptions;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub status: String,
    pub plan_type: String,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    /// Pro access is derived, never stored: an active subscription on the
    /// pro plan and nothing else.
    pub fn is_pro(&self) -> bool {
        SubscriptionStatus::from_str(&self.status) == Some(SubscriptionStatus::Active)
            && PlanType::from_str(&self.plan_type) == PlanType::Pro
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub user_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub status: String,
    pub plan_type: String,
}

/// Nullable columns the webhooks must be able to clear again (a
/// re-activated subscription drops its `canceled_at`) are double-optioned:
/// outer `None` leaves the column alone, `Some(None)` writes NULL.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct UpdateSubscriptionEntity {
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<Option<String>>,
    pub status: Option<String>,
    pub plan_type: Option<String>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: Option<bool>,
    pub canceled_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: DateTime<Utc>,
}
