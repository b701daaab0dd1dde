use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::scheduled_posts::ScheduledPostEntity;

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulePostModel {
    pub content: String,
    pub scheduled_for: DateTime<Utc>,
    pub post_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPostDto {
    pub id: Uuid,
    pub content: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub x_post_id: Option<String>,
    pub error_message: Option<String>,
}

impl ScheduledPostDto {
    pub fn from_entity(entity: &ScheduledPostEntity) -> Self {
        Self {
            id: entity.id,
            content: entity.content.clone(),
            scheduled_for: entity.scheduled_for,
            status: entity.status.clone(),
            posted_at: entity.posted_at,
            x_post_id: entity.x_post_id.clone(),
            error_message: entity.error_message.clone(),
        }
    }
}

/// Aggregate counters for the authenticated user's posting queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueAnalyticsDto {
    pub pending: i64,
    pub posted: i64,
    pub failed: i64,
}
