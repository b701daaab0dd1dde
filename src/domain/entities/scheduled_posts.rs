use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::scheduled_posts;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = scheduled_posts)]
pub struct ScheduledPostEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Option<Uuid>,
    pub content: String,
    pub scheduled_for: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub status: String,
    pub x_post_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scheduled_posts)]
pub struct InsertScheduledPostEntity {
    pub user_id: Uuid,
    pub post_id: Option<Uuid>,
    pub content: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
}
