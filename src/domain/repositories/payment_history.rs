use anyhow::Result;
use axum::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_history::{InsertPaymentHistoryEntity, PaymentHistoryEntity};

#[async_trait]
#[automock]
pub trait PaymentHistoryRepository {
    async fn record(
        &self,
        insert_payment_history_entity: InsertPaymentHistoryEntity,
    ) -> Result<Uuid>;
    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<PaymentHistoryEntity>>;
}
