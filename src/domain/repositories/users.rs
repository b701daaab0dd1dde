use anyhow::Result;
use axum::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::entities::users::{
    InsertUserEntity, UpdateUserSettingsEntity, UpdateUserTokensEntity, UserEntity,
};

#[async_trait]
#[automock]
pub trait UserRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<UserEntity>;
    async fn find_by_x_user_id(&self, x_user_id: String) -> Result<Option<UserEntity>>;
    async fn create(&self, insert_user_entity: InsertUserEntity) -> Result<Uuid>;
    async fn update_tokens(
        &self,
        user_id: Uuid,
        update_user_tokens_entity: UpdateUserTokensEntity,
    ) -> Result<()>;
    async fn clear_tokens(&self, user_id: Uuid) -> Result<()>;
    async fn update_voice_profile(
        &self,
        user_id: Uuid,
        voice_profile: Value,
        detected_niche: Option<String>,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn update_settings(
        &self,
        user_id: Uuid,
        update_user_settings_entity: UpdateUserSettingsEntity,
    ) -> Result<()>;
}
