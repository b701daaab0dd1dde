use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::payment_history::{InsertPaymentHistoryEntity, PaymentHistoryEntity},
        repositories::payment_history::PaymentHistoryRepository,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::payment_history},
};

pub struct PaymentHistoryPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentHistoryPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentHistoryRepository for PaymentHistoryPostgres {
    async fn record(
        &self,
        insert_payment_history_entity: InsertPaymentHistoryEntity,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = diesel::insert_into(payment_history::table)
            .values(&insert_payment_history_entity)
            .returning(payment_history::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn list_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<PaymentHistoryEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = payment_history::table
            .filter(payment_history::subscription_id.eq(subscription_id))
            .order(payment_history::created_at.desc())
            .select(PaymentHistoryEntity::as_select())
            .load::<PaymentHistoryEntity>(&mut conn)?;

        Ok(results)
    }
}
