use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::posts;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = posts)]
pub struct PostEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub source_post_id: Option<String>,
    pub source_author: Option<String>,
    pub backend_used: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = posts)]
pub struct InsertPostEntity {
    pub user_id: Uuid,
    pub content: String,
    pub source_post_id: Option<String>,
    pub source_author: Option<String>,
    pub backend_used: Option<String>,
    pub status: String,
}
