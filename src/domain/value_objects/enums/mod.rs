pub mod ai_backends;
pub mod payment_statuses;
pub mod plan_types;
pub mod post_statuses;
pub mod scheduled_post_statuses;
pub mod subscription_statuses;
