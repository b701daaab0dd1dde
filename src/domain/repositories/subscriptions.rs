use anyhow::Result;
use axum::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{
    InsertSubscriptionEntity, SubscriptionEntity, UpdateSubscriptionEntity,
};

#[async_trait]
#[automock]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;
    async fn find_by_id(&self, subscription_id: Uuid) -> Result<SubscriptionEntity>;
    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: String,
    ) -> Result<Option<SubscriptionEntity>>;
    async fn create(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> Result<Uuid>;
    async fn update(
        &self,
        subscription_id: Uuid,
        update_subscription_entity: UpdateSubscriptionEntity,
    ) -> Result<()>;
}
