use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::posts::{InsertPostEntity, PostEntity},
        repositories::posts::PostRepository,
        value_objects::enums::post_statuses::PostStatus,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::posts},
};

pub struct PostPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PostPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PostRepository for PostPostgres {
    async fn create(&self, insert_post_entity: InsertPostEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(posts::table)
            .values(&insert_post_entity)
            .returning(posts::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id_for_user(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PostEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = posts::table
            .filter(posts::id.eq(post_id))
            .filter(posts::user_id.eq(user_id))
            .select(PostEntity::as_select())
            .first::<PostEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_drafts_for_user(&self, user_id: Uuid) -> Result<Vec<PostEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = posts::table
            .filter(posts::user_id.eq(user_id))
            .filter(posts::status.eq(PostStatus::Draft.to_string()))
            .order(posts::created_at.desc())
            .select(PostEntity::as_select())
            .load::<PostEntity>(&mut conn)?;

        Ok(results)
    }

    async fn mark_scheduled(&self, post_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(posts::table)
            .filter(posts::id.eq(post_id))
            .set(posts::status.eq(PostStatus::Scheduled.to_string()))
            .execute(&mut conn)?;

        Ok(())
    }
}
