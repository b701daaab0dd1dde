use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::subscriptions::{
            InsertSubscriptionEntity, SubscriptionEntity, UpdateSubscriptionEntity,
        },
        repositories::subscriptions::SubscriptionRepository,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .order(subscriptions::created_at.desc())
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::id.eq(subscription_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: String,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::stripe_subscription_id.eq(stripe_subscription_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn create(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(subscriptions::table)
            .values(&insert_subscription_entity)
            .returning(subscriptions::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn update(
        &self,
        subscription_id: Uuid,
        update_subscription_entity: UpdateSubscriptionEntity,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(subscriptions::table)
            .filter(subscriptions::id.eq(subscription_id))
            .set(&update_subscription_entity)
            .execute(&mut conn)?;

        Ok(())
    }
}
