use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::users::{
            InsertUserEntity, UpdateUserSettingsEntity, UpdateUserTokensEntity, UserEntity,
        },
        repositories::users::UserRepository,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::users},
};

pub struct UserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for UserPostgres {
    async fn find_by_id(&self, user_id: Uuid) -> Result<UserEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = users::table
            .filter(users::id.eq(user_id))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_x_user_id(&self, x_user_id: String) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = users::table
            .filter(users::x_user_id.eq(x_user_id))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn create(&self, insert_user_entity: InsertUserEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(users::table)
            .values(&insert_user_entity)
            .returning(users::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn update_tokens(
        &self,
        user_id: Uuid,
        update_user_tokens_entity: UpdateUserTokensEntity,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(users::table)
            .filter(users::id.eq(user_id))
            .set(&update_user_tokens_entity)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn clear_tokens(&self, user_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(users::table)
            .filter(users::id.eq(user_id))
            .set((
                users::x_access_token.eq(None::<String>),
                users::x_refresh_token.eq(None::<String>),
                users::x_token_expires_at.eq(None::<DateTime<Utc>>),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn update_voice_profile(
        &self,
        user_id: Uuid,
        voice_profile: Value,
        detected_niche: Option<String>,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(users::table)
            .filter(users::id.eq(user_id))
            .set((
                users::voice_profile.eq(Some(voice_profile)),
                users::detected_niche.eq(detected_niche),
                users::analysis_complete.eq(true),
                users::updated_at.eq(analyzed_at),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn update_settings(
        &self,
        user_id: Uuid,
        update_user_settings_entity: UpdateUserSettingsEntity,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(users::table)
            .filter(users::id.eq(user_id))
            .set(&update_user_settings_entity)
            .execute(&mut conn)?;

        Ok(())
    }
}
