use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::users;

/// Token columns hold ciphertext, never raw OAuth tokens.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = users)]
pub struct UserEntity {
    pub id: Uuid,
    pub email: Option<String>,
    pub x_user_id: String,
    pub x_username: String,
    pub x_access_token: Option<String>,
    pub x_refresh_token: Option<String>,
    pub x_token_expires_at: Option<DateTime<Utc>>,
    pub detected_niche: Option<String>,
    pub voice_profile: Option<Value>,
    pub analysis_complete: bool,
    pub auto_pilot_enabled: bool,
    pub posts_per_day: i32,
    pub preferred_backend: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct InsertUserEntity {
    pub email: Option<String>,
    pub x_user_id: String,
    pub x_username: String,
    pub x_access_token: Option<String>,
    pub x_refresh_token: Option<String>,
    pub x_token_expires_at: Option<DateTime<Utc>>,
    pub preferred_backend: String,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub struct UpdateUserTokensEntity {
    pub x_username: String,
    pub x_access_token: Option<String>,
    pub x_refresh_token: Option<String>,
    pub x_token_expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub struct UpdateUserSettingsEntity {
    pub auto_pilot_enabled: Option<bool>,
    pub posts_per_day: Option<i32>,
    pub preferred_backend: Option<String>,
    pub updated_at: DateTime<Utc>,
}
