use serde::{Deserialize, Serialize};

use crate::domain::entities::users::UserEntity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRedirectDto {
    pub authorize_url: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedAccountDto {
    pub x_user_id: String,
    pub x_username: String,
    pub connected: bool,
    pub analysis_complete: bool,
    pub detected_niche: Option<String>,
    pub auto_pilot_enabled: bool,
    pub posts_per_day: i32,
    pub preferred_backend: String,
}

impl ConnectedAccountDto {
    pub fn from_entity(entity: &UserEntity) -> Self {
        Self {
            x_user_id: entity.x_user_id.clone(),
            x_username: entity.x_username.clone(),
            connected: entity.x_access_token.is_some(),
            analysis_complete: entity.analysis_complete,
            detected_niche: entity.detected_niche.clone(),
            auto_pilot_enabled: entity.auto_pilot_enabled,
            posts_per_day: entity.posts_per_day,
            preferred_backend: entity.preferred_backend.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettingsModel {
    pub auto_pilot_enabled: Option<bool>,
    pub posts_per_day: Option<i32>,
    pub preferred_backend: Option<String>,
}
