use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Local mirror of the billing provider's subscription status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Incomplete,
    Active,
    PastDue,
    Canceled,
    Unpaid,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
        };
        write!(f, "{}", status)
    }
}

impl SubscriptionStatus {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "incomplete" => Some(SubscriptionStatus::Incomplete),
            "active" => Some(SubscriptionStatus::Active),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "canceled" => Some(SubscriptionStatus::Canceled),
            "unpaid" => Some(SubscriptionStatus::Unpaid),
            _ => None,
        }
    }
}
