use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::scheduled_posts::{InsertScheduledPostEntity, ScheduledPostEntity},
        repositories::scheduled_posts::ScheduledPostRepository,
        value_objects::{
            enums::scheduled_post_statuses::ScheduledPostStatus,
            scheduling_model::QueueAnalyticsDto,
        },
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::scheduled_posts},
};

pub struct ScheduledPostPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ScheduledPostPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ScheduledPostRepository for ScheduledPostPostgres {
    async fn create(
        &self,
        insert_scheduled_post_entity: InsertScheduledPostEntity,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(scheduled_posts::table)
            .values(&insert_scheduled_post_entity)
            .returning(scheduled_posts::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id(&self, scheduled_post_id: Uuid) -> Result<ScheduledPostEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = scheduled_posts::table
            .filter(scheduled_posts::id.eq(scheduled_post_id))
            .select(ScheduledPostEntity::as_select())
            .first::<ScheduledPostEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id_for_user(
        &self,
        scheduled_post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ScheduledPostEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = scheduled_posts::table
            .filter(scheduled_posts::id.eq(scheduled_post_id))
            .filter(scheduled_posts::user_id.eq(user_id))
            .select(ScheduledPostEntity::as_select())
            .first::<ScheduledPostEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ScheduledPostEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = scheduled_posts::table
            .filter(scheduled_posts::user_id.eq(user_id))
            .order(scheduled_posts::scheduled_for.asc())
            .select(ScheduledPostEntity::as_select())
            .load::<ScheduledPostEntity>(&mut conn)?;

        Ok(results)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPostEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = scheduled_posts::table
            .filter(scheduled_posts::status.eq(ScheduledPostStatus::Pending.to_string()))
            .filter(scheduled_posts::scheduled_for.le(now))
            .order(scheduled_posts::scheduled_for.asc())
            .select(ScheduledPostEntity::as_select())
            .load::<ScheduledPostEntity>(&mut conn)?;

        Ok(results)
    }

    async fn mark_posted(
        &self,
        scheduled_post_id: Uuid,
        x_post_id: String,
        posted_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(scheduled_posts::table)
            .filter(scheduled_posts::id.eq(scheduled_post_id))
            .set((
                scheduled_posts::status.eq(ScheduledPostStatus::Posted.to_string()),
                scheduled_posts::x_post_id.eq(Some(x_post_id)),
                scheduled_posts::posted_at.eq(Some(posted_at)),
                scheduled_posts::error_message.eq(None::<String>),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_failed(&self, scheduled_post_id: Uuid, error_message: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(scheduled_posts::table)
            .filter(scheduled_posts::id.eq(scheduled_post_id))
            .set((
                scheduled_posts::status.eq(ScheduledPostStatus::Failed.to_string()),
                scheduled_posts::error_message.eq(Some(error_message)),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn reschedule(
        &self,
        scheduled_post_id: Uuid,
        scheduled_for: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(scheduled_posts::table)
            .filter(scheduled_posts::id.eq(scheduled_post_id))
            .set(scheduled_posts::scheduled_for.eq(scheduled_for))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn delete(&self, scheduled_post_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::delete(scheduled_posts::table)
            .filter(scheduled_posts::id.eq(scheduled_post_id))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn queue_analytics(&self, user_id: Uuid) -> Result<QueueAnalyticsDto> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = scheduled_posts::table
            .filter(scheduled_posts::user_id.eq(user_id))
            .group_by(scheduled_posts::status)
            .select((scheduled_posts::status, diesel::dsl::count_star()))
            .load::<(String, i64)>(&mut conn)?;

        let mut analytics = QueueAnalyticsDto::default();
        for (status, count) in rows {
            match ScheduledPostStatus::from_str(&status) {
                ScheduledPostStatus::Pending => analytics.pending = count,
                ScheduledPostStatus::Posted => analytics.posted = count,
                ScheduledPostStatus::Failed => analytics.failed = count,
            }
        }

        Ok(analytics)
    }
}
