pub mod payment_history;
pub mod posts;
pub mod scheduled_posts;
pub mod subscriptions;
pub mod users;
pub mod webhook_events;
