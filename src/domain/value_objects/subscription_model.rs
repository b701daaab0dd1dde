use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::subscriptions::SubscriptionEntity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentSubscriptionDto {
    pub status: String,
    pub plan_type: String,
    pub is_pro: bool,
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl CurrentSubscriptionDto {
    pub fn from_entity(entity: &SubscriptionEntity) -> Self {
        Self {
            status: entity.status.clone(),
            plan_type: entity.plan_type.clone(),
            is_pro: entity.is_pro(),
            cancel_at_period_end: entity.cancel_at_period_end,
            current_period_end: entity.current_period_end,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSessionDto {
    pub checkout_url: String,
}
