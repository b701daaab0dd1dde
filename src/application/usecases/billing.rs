use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result as AnyResult, anyhow};
use axum::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            payment_history::InsertPaymentHistoryEntity,
            subscriptions::{InsertSubscriptionEntity, UpdateSubscriptionEntity},
            webhook_events::InsertWebhookEventEntity,
        },
        repositories::{
            payment_history::PaymentHistoryRepository, subscriptions::SubscriptionRepository,
            users::UserRepository, webhook_events::WebhookEventRepository,
        },
        value_objects::{
            enums::{
                payment_statuses::PaymentStatus, plan_types::PlanType,
                subscription_statuses::SubscriptionStatus,
            },
            subscription_model::{CheckoutSessionDto, CurrentSubscriptionDto},
        },
    },
    payments::stripe_client::{StripeClient, StripeEvent},
};

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait StripeGateway: Send + Sync {
    async fn create_customer(&self, email: Option<String>, user_id: Uuid) -> AnyResult<String>;
    async fn create_checkout_session(
        &self,
        price_id: String,
        customer_id: String,
        metadata: HashMap<String, String>,
    ) -> AnyResult<String>;
    async fn cancel_at_period_end(&self, stripe_subscription_id: String) -> AnyResult<()>;
    fn verify_webhook_signature(
        &self,
        payload: Vec<u8>,
        signature_header: String,
    ) -> AnyResult<StripeEvent>;
}

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("webhook signature verification failed")]
    InvalidSignature,
    #[error("user already has an active pro subscription")]
    AlreadySubscribed,
    #[error("no provider subscription to cancel")]
    NothingToCancel,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BillingError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            BillingError::InvalidSignature | BillingError::AlreadySubscribed => {
                StatusCode::BAD_REQUEST
            }
            BillingError::NothingToCancel => StatusCode::NOT_FOUND,
            BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type BillingResult<T> = std::result::Result<T, BillingError>;

#[derive(Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    /// Replay of an already-processed event, nothing was touched.
    AlreadyProcessed,
    /// Verified but irrelevant or unmatchable, acknowledged without state
    /// changes.
    Ignored,
}

pub struct BillingUseCase<S, P, W, U, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentHistoryRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    subscription_repository: Arc<S>,
    payment_history_repository: Arc<P>,
    webhook_event_repository: Arc<W>,
    user_repository: Arc<U>,
    stripe_gateway: Arc<G>,
    pro_price_id: String,
}

fn base_update() -> UpdateSubscriptionEntity {
    UpdateSubscriptionEntity {
        stripe_customer_id: None,
        stripe_subscription_id: None,
        stripe_price_id: None,
        status: None,
        plan_type: None,
        current_period_start: None,
        current_period_end: None,
        cancel_at_period_end: None,
        canceled_at: None,
        updated_at: Utc::now(),
    }
}

impl<S, P, W, U, G> BillingUseCase<S, P, W, U, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentHistoryRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    pub fn new(
        subscription_repository: Arc<S>,
        payment_history_repository: Arc<P>,
        webhook_event_repository: Arc<W>,
        user_repository: Arc<U>,
        stripe_gateway: Arc<G>,
        pro_price_id: String,
    ) -> Self {
        Self {
            subscription_repository,
            payment_history_repository,
            webhook_event_repository,
            user_repository,
            stripe_gateway,
            pro_price_id,
        }
    }

    pub async fn current_subscription(
        &self,
        user_id: Uuid,
    ) -> BillingResult<CurrentSubscriptionDto> {
        let subscription = self
            .subscription_repository
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "billing: subscription lookup failed");
                BillingError::Internal(err)
            })?;

        match subscription {
            Some(entity) => Ok(CurrentSubscriptionDto::from_entity(&entity)),
            None => Ok(CurrentSubscriptionDto {
                status: SubscriptionStatus::Incomplete.to_string(),
                plan_type: PlanType::Free.to_string(),
                is_pro: false,
                cancel_at_period_end: false,
                current_period_end: None,
            }),
        }
    }

    pub async fn is_pro_user(&self, user_id: Uuid) -> AnyResult<bool> {
        let subscription = self
            .subscription_repository
            .find_by_user_id(user_id)
            .await?;

        Ok(subscription.map(|entity| entity.is_pro()).unwrap_or(false))
    }

    /// Creates a Checkout Session for the pro plan. The local row starts
    /// incomplete; only webhooks promote it.
    pub async fn checkout(&self, user_id: Uuid) -> BillingResult<CheckoutSessionDto> {
        let user = self.user_repository.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "billing: user lookup failed");
            BillingError::Internal(err)
        })?;

        let existing = self
            .subscription_repository
            .find_by_user_id(user_id)
            .await
            .map_err(BillingError::Internal)?;

        if existing.as_ref().map(|e| e.is_pro()).unwrap_or(false) {
            warn!(%user_id, "billing: checkout attempted while already pro");
            return Err(BillingError::AlreadySubscribed);
        }

        let (subscription_id, customer_id) = match existing {
            Some(entity) => (entity.id, entity.stripe_customer_id),
            None => {
                let subscription_id = self
                    .subscription_repository
                    .create(InsertSubscriptionEntity {
                        user_id,
                        stripe_customer_id: None,
                        stripe_subscription_id: None,
                        stripe_price_id: None,
                        // Pro is only ever granted by webhooks once the
                        // subscription goes active.
                        status: SubscriptionStatus::Incomplete.to_string(),
                        plan_type: PlanType::Free.to_string(),
                    })
                    .await
                    .map_err(|err| {
                        error!(%user_id, db_error = ?err, "billing: subscription row creation failed");
                        BillingError::Internal(err)
                    })?;
                (subscription_id, None)
            }
        };

        let customer_id = match customer_id {
            Some(id) => id,
            None => {
                let id = self
                    .stripe_gateway
                    .create_customer(user.email.clone(), user_id)
                    .await
                    .map_err(|err| {
                        error!(%user_id, stripe_error = ?err, "billing: customer creation failed");
                        BillingError::Internal(err)
                    })?;

                let mut update = base_update();
                update.stripe_customer_id = Some(id.clone());
                self.subscription_repository
                    .update(subscription_id, update)
                    .await
                    .map_err(BillingError::Internal)?;
                id
            }
        };

        let metadata = HashMap::from([
            ("subscription_id".to_string(), subscription_id.to_string()),
            ("user_id".to_string(), user_id.to_string()),
        ]);

        let checkout_url = self
            .stripe_gateway
            .create_checkout_session(self.pro_price_id.clone(), customer_id, metadata)
            .await
            .map_err(|err| {
                error!(%user_id, stripe_error = ?err, "billing: checkout session creation failed");
                BillingError::Internal(err)
            })?;

        info!(%user_id, %subscription_id, "billing: checkout session created");
        Ok(CheckoutSessionDto { checkout_url })
    }

    /// Asks the provider to cancel at period end. Local state is not
    /// touched; the resulting webhook is the single source of truth.
    pub async fn cancel(&self, user_id: Uuid) -> BillingResult<()> {
        let subscription = self
            .subscription_repository
            .find_by_user_id(user_id)
            .await
            .map_err(BillingError::Internal)?;

        let stripe_subscription_id = subscription
            .and_then(|entity| entity.stripe_subscription_id)
            .ok_or(BillingError::NothingToCancel)?;

        self.stripe_gateway
            .cancel_at_period_end(stripe_subscription_id.clone())
            .await
            .map_err(|err| {
                error!(%user_id, stripe_error = ?err, "billing: cancel request failed");
                BillingError::Internal(err)
            })?;

        info!(%user_id, %stripe_subscription_id, "billing: cancel at period end requested");
        Ok(())
    }

    /// Webhook pipeline: verify, dedupe via the event ledger, dispatch, then
    /// stamp the outcome. Failed handlers leave the row unprocessed so the
    /// provider's retry gets another shot.
    pub async fn handle_webhook(
        &self,
        payload: Vec<u8>,
        signature_header: String,
    ) -> BillingResult<WebhookOutcome> {
        let event = self
            .stripe_gateway
            .verify_webhook_signature(payload, signature_header)
            .map_err(|err| {
                warn!(verify_error = ?err, "billing: webhook signature rejected");
                BillingError::InvalidSignature
            })?;

        let ledger_row_id = match self
            .webhook_event_repository
            .find_by_event_id(event.id.clone())
            .await
            .map_err(BillingError::Internal)?
        {
            Some(row) if row.processed => {
                info!(stripe_event_id = %event.id, "billing: replayed event, skipping");
                return Ok(WebhookOutcome::AlreadyProcessed);
            }
            Some(row) => row.id,
            None => self
                .webhook_event_repository
                .insert(InsertWebhookEventEntity {
                    stripe_event_id: event.id.clone(),
                    event_type: event.type_.clone(),
                    processed: false,
                })
                .await
                .map_err(BillingError::Internal)?,
        };

        let outcome = match self.dispatch_event(&event).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    stripe_event_id = %event.id,
                    event_type = %event.type_,
                    handler_error = ?err,
                    "billing: webhook handler failed"
                );
                self.webhook_event_repository
                    .record_error(ledger_row_id, err.to_string())
                    .await
                    .map_err(BillingError::Internal)?;
                return Err(BillingError::Internal(err));
            }
        };

        self.webhook_event_repository
            .mark_processed(ledger_row_id)
            .await
            .map_err(BillingError::Internal)?;

        info!(
            stripe_event_id = %event.id,
            event_type = %event.type_,
            "billing: webhook processed"
        );
        Ok(outcome)
    }

    async fn dispatch_event(&self, event: &StripeEvent) -> AnyResult<WebhookOutcome> {
        match event.type_.as_str() {
            "checkout.session.completed" => self.on_checkout_completed(event).await,
            "customer.subscription.updated" => self.on_subscription_updated(event).await,
            "customer.subscription.deleted" => self.on_subscription_deleted(event).await,
            "invoice.paid" => self.on_invoice_paid(event).await,
            "invoice.payment_failed" => self.on_invoice_payment_failed(event).await,
            other => {
                info!(event_type = %other, "billing: ignoring unhandled event type");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn on_checkout_completed(&self, event: &StripeEvent) -> AnyResult<WebhookOutcome> {
        let session = StripeClient::extract_checkout_session(event)
            .ok_or_else(|| anyhow!("checkout.session.completed payload is malformed"))?;

        let subscription_id = session
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.get("subscription_id"))
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| anyhow!("checkout session metadata is missing subscription_id"))?;

        // Activation only applies while the row is still incomplete. A
        // late-delivered checkout event must not roll back a newer
        // subscription.updated / .deleted state.
        let local = self.subscription_repository.find_by_id(subscription_id).await?;
        if SubscriptionStatus::from_str(&local.status) != Some(SubscriptionStatus::Incomplete) {
            warn!(
                %subscription_id,
                local_status = %local.status,
                "billing: stale checkout completion, ignoring"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let mut update = base_update();
        update.stripe_subscription_id = session.subscription;
        update.stripe_customer_id = session.customer;
        update.status = Some(SubscriptionStatus::Active.to_string());
        update.plan_type = Some(PlanType::Pro.to_string());

        self.subscription_repository
            .update(subscription_id, update)
            .await?;

        Ok(WebhookOutcome::Processed)
    }

    async fn on_subscription_updated(&self, event: &StripeEvent) -> AnyResult<WebhookOutcome> {
        let provider = StripeClient::extract_subscription(event)
            .ok_or_else(|| anyhow!("customer.subscription.updated payload is malformed"))?;

        let Some(local) = self
            .subscription_repository
            .find_by_stripe_subscription_id(provider.id.clone())
            .await?
        else {
            warn!(
                stripe_subscription_id = %provider.id,
                "billing: update for unknown subscription, ignoring"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(status) = SubscriptionStatus::from_str(&provider.status) else {
            warn!(
                provider_status = %provider.status,
                "billing: unknown provider status, leaving local state untouched"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        // Plan follows the provider status on every known transition: pro
        // only while active, free otherwise.
        let plan = if status == SubscriptionStatus::Active {
            PlanType::Pro
        } else {
            PlanType::Free
        };

        let mut update = base_update();
        update.status = Some(status.to_string());
        update.plan_type = Some(plan.to_string());
        update.stripe_price_id = Some(provider.price_id());
        update.current_period_start = provider.period_start();
        update.current_period_end = provider.period_end();
        update.cancel_at_period_end = Some(provider.cancel_at_period_end);
        update.canceled_at = Some(provider.canceled_at_utc());

        self.subscription_repository.update(local.id, update).await?;

        Ok(WebhookOutcome::Processed)
    }

    async fn on_subscription_deleted(&self, event: &StripeEvent) -> AnyResult<WebhookOutcome> {
        let provider = StripeClient::extract_subscription(event)
            .ok_or_else(|| anyhow!("customer.subscription.deleted payload is malformed"))?;

        let Some(local) = self
            .subscription_repository
            .find_by_stripe_subscription_id(provider.id.clone())
            .await?
        else {
            warn!(
                stripe_subscription_id = %provider.id,
                "billing: delete for unknown subscription, ignoring"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        // Deletion drops the account back to free; is_pro is derived so no
        // flag needs flipping.
        let mut update = base_update();
        update.status = Some(SubscriptionStatus::Canceled.to_string());
        update.plan_type = Some(PlanType::Free.to_string());
        update.cancel_at_period_end = Some(false);
        update.canceled_at = Some(provider.canceled_at_utc().or_else(|| Some(Utc::now())));

        self.subscription_repository.update(local.id, update).await?;

        Ok(WebhookOutcome::Processed)
    }

    async fn on_invoice_paid(&self, event: &StripeEvent) -> AnyResult<WebhookOutcome> {
        let invoice = StripeClient::extract_invoice(event)
            .ok_or_else(|| anyhow!("invoice.paid payload is malformed"))?;

        let Some(local) = self.find_invoice_subscription(invoice.subscription.clone()).await?
        else {
            return Ok(WebhookOutcome::Ignored);
        };

        self.payment_history_repository
            .record(InsertPaymentHistoryEntity {
                subscription_id: local.id,
                stripe_invoice_id: invoice.id,
                stripe_payment_intent_id: invoice.payment_intent,
                amount_minor: invoice
                    .amount_paid
                    .and_then(|amount| i32::try_from(amount).ok())
                    .unwrap_or_default(),
                currency: invoice.currency.unwrap_or_else(|| "usd".to_string()),
                status: PaymentStatus::Succeeded.to_string(),
                description: invoice.description,
                failure_reason: None,
                paid_at: Some(Utc::now()),
            })
            .await?;

        // A successful invoice only appends to the payment history; the
        // subscription status moves via subscription.updated, and a stale
        // retry here must not resurrect a canceled subscription.
        Ok(WebhookOutcome::Processed)
    }

    async fn on_invoice_payment_failed(&self, event: &StripeEvent) -> AnyResult<WebhookOutcome> {
        let invoice = StripeClient::extract_invoice(event)
            .ok_or_else(|| anyhow!("invoice.payment_failed payload is malformed"))?;

        let Some(local) = self.find_invoice_subscription(invoice.subscription.clone()).await?
        else {
            return Ok(WebhookOutcome::Ignored);
        };

        let failure_reason = invoice
            .last_finalization_error
            .and_then(|error| error.message)
            .unwrap_or_else(|| "payment failed".to_string());

        self.payment_history_repository
            .record(InsertPaymentHistoryEntity {
                subscription_id: local.id,
                stripe_invoice_id: invoice.id,
                stripe_payment_intent_id: invoice.payment_intent,
                amount_minor: invoice
                    .amount_due
                    .and_then(|amount| i32::try_from(amount).ok())
                    .unwrap_or_default(),
                currency: invoice.currency.unwrap_or_else(|| "usd".to_string()),
                status: PaymentStatus::Failed.to_string(),
                description: invoice.description,
                failure_reason: Some(failure_reason),
                paid_at: None,
            })
            .await?;

        let mut update = base_update();
        update.status = Some(SubscriptionStatus::PastDue.to_string());
        self.subscription_repository.update(local.id, update).await?;

        Ok(WebhookOutcome::Processed)
    }

    async fn find_invoice_subscription(
        &self,
        stripe_subscription_id: Option<String>,
    ) -> AnyResult<Option<crate::domain::entities::subscriptions::SubscriptionEntity>> {
        let Some(stripe_subscription_id) = stripe_subscription_id else {
            warn!("billing: invoice without subscription reference, ignoring");
            return Ok(None);
        };

        let local = self
            .subscription_repository
            .find_by_stripe_subscription_id(stripe_subscription_id.clone())
            .await?;

        if local.is_none() {
            warn!(
                %stripe_subscription_id,
                "billing: invoice for unknown subscription, ignoring"
            );
        }

        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::subscriptions::SubscriptionEntity;
    use crate::domain::entities::users::UserEntity;
    use crate::domain::entities::webhook_events::WebhookEventEntity;
    use crate::domain::repositories::payment_history::MockPaymentHistoryRepository;
    use crate::domain::repositories::subscriptions::MockSubscriptionRepository;
    use crate::domain::repositories::users::MockUserRepository;
    use crate::domain::repositories::webhook_events::MockWebhookEventRepository;

    fn sample_subscription(stripe_subscription_id: &str) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            stripe_customer_id: Some("cus_1".to_string()),
            stripe_subscription_id: Some(stripe_subscription_id.to_string()),
            stripe_price_id: Some("price_pro".to_string()),
            status: SubscriptionStatus::Active.to_string(),
            plan_type: PlanType::Pro.to_string(),
            current_period_start: Some(now),
            current_period_end: Some(now + chrono::Duration::days(30)),
            cancel_at_period_end: false,
            canceled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn event_json(event_type: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": object }
        }))
        .unwrap()
    }

    fn gateway_returning(event: StripeEvent) -> MockStripeGateway {
        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(move |_, _| Ok(event.clone()));
        gateway
    }

    fn use_case(
        subscription_repo: MockSubscriptionRepository,
        payment_repo: MockPaymentHistoryRepository,
        webhook_repo: MockWebhookEventRepository,
        user_repo: MockUserRepository,
        gateway: MockStripeGateway,
    ) -> BillingUseCase<
        MockSubscriptionRepository,
        MockPaymentHistoryRepository,
        MockWebhookEventRepository,
        MockUserRepository,
        MockStripeGateway,
    > {
        BillingUseCase::new(
            Arc::new(subscription_repo),
            Arc::new(payment_repo),
            Arc::new(webhook_repo),
            Arc::new(user_repo),
            Arc::new(gateway),
            "price_pro".to_string(),
        )
    }

    #[tokio::test]
    async fn invalid_signature_writes_nothing() {
        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_verify_webhook_signature()
            .returning(|_, _| Err(anyhow!("bad signature")));

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo.expect_find_by_event_id().times(0);
        webhook_repo.expect_insert().times(0);

        let use_case = use_case(
            MockSubscriptionRepository::new(),
            MockPaymentHistoryRepository::new(),
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let result = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=bad".to_string())
            .await;

        assert!(matches!(result, Err(BillingError::InvalidSignature)));
    }

    #[tokio::test]
    async fn replayed_event_short_circuits_without_writes() {
        let event = event_json("invoice.paid", serde_json::json!({"subscription": "sub_1"}));
        let gateway = gateway_returning(event);

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo.expect_find_by_event_id().returning(|event_id| {
            Box::pin(async move {
                Ok(Some(WebhookEventEntity {
                    id: Uuid::new_v4(),
                    stripe_event_id: event_id,
                    event_type: "invoice.paid".to_string(),
                    processed: true,
                    error: None,
                    received_at: Utc::now(),
                    processed_at: Some(Utc::now()),
                }))
            })
        });
        webhook_repo.expect_insert().times(0);
        webhook_repo.expect_mark_processed().times(0);

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_update().times(0);

        let mut payment_repo = MockPaymentHistoryRepository::new();
        payment_repo.expect_record().times(0);

        let use_case = use_case(
            subscription_repo,
            payment_repo,
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let outcome = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::AlreadyProcessed);
    }

    #[tokio::test]
    async fn subscription_deleted_downgrades_to_free() {
        let event = event_json(
            "customer.subscription.deleted",
            serde_json::json!({"id": "sub_1", "status": "canceled"}),
        );
        let gateway = gateway_returning(event);

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo
            .expect_find_by_event_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        webhook_repo
            .expect_insert()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        webhook_repo
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_stripe_subscription_id()
            .returning(|_| Box::pin(async { Ok(Some(sample_subscription("sub_1"))) }));
        subscription_repo
            .expect_update()
            .withf(|_, update| {
                update.status.as_deref() == Some("canceled")
                    && update.plan_type.as_deref() == Some("free")
                    && matches!(update.canceled_at, Some(Some(_)))
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let use_case = use_case(
            subscription_repo,
            MockPaymentHistoryRepository::new(),
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let outcome = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn subscription_update_to_active_grants_pro_and_clears_cancellation() {
        let event = event_json(
            "customer.subscription.updated",
            serde_json::json!({"id": "sub_1", "status": "active"}),
        );
        let gateway = gateway_returning(event);

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo
            .expect_find_by_event_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        webhook_repo
            .expect_insert()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        webhook_repo
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_stripe_subscription_id()
            .returning(|_| {
                let mut local = sample_subscription("sub_1");
                local.status = SubscriptionStatus::PastDue.to_string();
                local.plan_type = PlanType::Free.to_string();
                local.canceled_at = Some(Utc::now());
                Box::pin(async move { Ok(Some(local)) })
            });
        subscription_repo
            .expect_update()
            .withf(|_, update| {
                update.status.as_deref() == Some("active")
                    && update.plan_type.as_deref() == Some("pro")
                    && update.canceled_at == Some(None)
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let use_case = use_case(
            subscription_repo,
            MockPaymentHistoryRepository::new(),
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let outcome = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn subscription_lapse_drops_plan_to_free() {
        let event = event_json(
            "customer.subscription.updated",
            serde_json::json!({"id": "sub_1", "status": "unpaid"}),
        );
        let gateway = gateway_returning(event);

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo
            .expect_find_by_event_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        webhook_repo
            .expect_insert()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        webhook_repo
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_stripe_subscription_id()
            .returning(|_| Box::pin(async { Ok(Some(sample_subscription("sub_1"))) }));
        subscription_repo
            .expect_update()
            .withf(|_, update| {
                update.status.as_deref() == Some("unpaid")
                    && update.plan_type.as_deref() == Some("free")
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let use_case = use_case(
            subscription_repo,
            MockPaymentHistoryRepository::new(),
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let outcome = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn invoice_paid_appends_history_without_touching_status() {
        let event = event_json(
            "invoice.paid",
            serde_json::json!({
                "id": "in_1",
                "subscription": "sub_1",
                "amount_paid": 2900,
                "currency": "usd"
            }),
        );
        let gateway = gateway_returning(event);

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo
            .expect_find_by_event_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        webhook_repo
            .expect_insert()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        webhook_repo
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        // A retried invoice.paid after cancellation must not resurrect the
        // subscription.
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_stripe_subscription_id()
            .returning(|_| {
                let mut local = sample_subscription("sub_1");
                local.status = SubscriptionStatus::Canceled.to_string();
                Box::pin(async move { Ok(Some(local)) })
            });
        subscription_repo.expect_update().times(0);

        let mut payment_repo = MockPaymentHistoryRepository::new();
        payment_repo
            .expect_record()
            .withf(|insert| {
                insert.status == "succeeded"
                    && insert.amount_minor == 2900
                    && insert.paid_at.is_some()
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));

        let use_case = use_case(
            subscription_repo,
            payment_repo,
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let outcome = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn payment_failure_records_history_and_marks_past_due() {
        let event = event_json(
            "invoice.payment_failed",
            serde_json::json!({
                "id": "in_1",
                "subscription": "sub_1",
                "amount_due": 2900,
                "currency": "usd",
                "last_finalization_error": {"message": "card declined"}
            }),
        );
        let gateway = gateway_returning(event);

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo
            .expect_find_by_event_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        webhook_repo
            .expect_insert()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        webhook_repo
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_stripe_subscription_id()
            .returning(|_| Box::pin(async { Ok(Some(sample_subscription("sub_1"))) }));
        subscription_repo
            .expect_update()
            .withf(|_, update| update.status.as_deref() == Some("past_due"))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let mut payment_repo = MockPaymentHistoryRepository::new();
        payment_repo
            .expect_record()
            .withf(|insert| {
                insert.status == "failed"
                    && insert.amount_minor == 2900
                    && insert.failure_reason.as_deref() == Some("card declined")
                    && insert.paid_at.is_none()
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));

        let use_case = use_case(
            subscription_repo,
            payment_repo,
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let outcome = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn unknown_provider_status_is_acknowledged_without_mutation() {
        let event = event_json(
            "customer.subscription.updated",
            serde_json::json!({"id": "sub_1", "status": "paused"}),
        );
        let gateway = gateway_returning(event);

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo
            .expect_find_by_event_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        webhook_repo
            .expect_insert()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        webhook_repo
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_stripe_subscription_id()
            .returning(|_| Box::pin(async { Ok(Some(sample_subscription("sub_1"))) }));
        subscription_repo.expect_update().times(0);

        let use_case = use_case(
            subscription_repo,
            MockPaymentHistoryRepository::new(),
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let outcome = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn handler_failure_stamps_error_and_leaves_row_unprocessed() {
        let event = event_json(
            "checkout.session.completed",
            serde_json::json!({"id": "cs_1", "metadata": {}}),
        );
        let gateway = gateway_returning(event);

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo
            .expect_find_by_event_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        webhook_repo
            .expect_insert()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        webhook_repo
            .expect_record_error()
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        webhook_repo.expect_mark_processed().times(0);

        let use_case = use_case(
            MockSubscriptionRepository::new(),
            MockPaymentHistoryRepository::new(),
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let result = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await;

        assert!(matches!(result, Err(BillingError::Internal(_))));
    }

    fn checkout_completed_event(subscription_id: Uuid) -> StripeEvent {
        event_json(
            "checkout.session.completed",
            serde_json::json!({
                "id": "cs_1",
                "subscription": "sub_1",
                "customer": "cus_1",
                "metadata": {"subscription_id": subscription_id.to_string()}
            }),
        )
    }

    #[tokio::test]
    async fn checkout_completion_promotes_incomplete_row() {
        let subscription_id = Uuid::new_v4();
        let gateway = gateway_returning(checkout_completed_event(subscription_id));

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo
            .expect_find_by_event_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        webhook_repo
            .expect_insert()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        webhook_repo
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_by_id().returning(move |_| {
            let mut local = sample_subscription("sub_1");
            local.id = subscription_id;
            local.status = SubscriptionStatus::Incomplete.to_string();
            local.plan_type = PlanType::Free.to_string();
            Box::pin(async move { Ok(local) })
        });
        subscription_repo
            .expect_update()
            .withf(|_, update| {
                update.status.as_deref() == Some("active")
                    && update.plan_type.as_deref() == Some("pro")
                    && update.stripe_subscription_id.as_deref() == Some("sub_1")
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let use_case = use_case(
            subscription_repo,
            MockPaymentHistoryRepository::new(),
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let outcome = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn stale_checkout_completion_does_not_override_newer_state() {
        let subscription_id = Uuid::new_v4();
        let gateway = gateway_returning(checkout_completed_event(subscription_id));

        let mut webhook_repo = MockWebhookEventRepository::new();
        webhook_repo
            .expect_find_by_event_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        webhook_repo
            .expect_insert()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        webhook_repo
            .expect_mark_processed()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        // The subscription was already canceled by a later-arriving event;
        // the delayed checkout completion must not re-activate it.
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo.expect_find_by_id().returning(move |_| {
            let mut local = sample_subscription("sub_1");
            local.id = subscription_id;
            local.status = SubscriptionStatus::Canceled.to_string();
            Box::pin(async move { Ok(local) })
        });
        subscription_repo.expect_update().times(0);

        let use_case = use_case(
            subscription_repo,
            MockPaymentHistoryRepository::new(),
            webhook_repo,
            MockUserRepository::new(),
            gateway,
        );

        let outcome = use_case
            .handle_webhook(b"{}".to_vec(), "t=1,v1=ok".to_string())
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn checkout_creates_an_incomplete_free_row() {
        let user_id = Uuid::new_v4();

        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_id().returning(|user_id| {
            let now = Utc::now();
            Box::pin(async move {
                Ok(UserEntity {
                    id: user_id,
                    email: Some("builder@example.com".to_string()),
                    x_user_id: "1234".to_string(),
                    x_username: "builder".to_string(),
                    x_access_token: None,
                    x_refresh_token: None,
                    x_token_expires_at: None,
                    detected_niche: None,
                    voice_profile: None,
                    analysis_complete: false,
                    auto_pilot_enabled: false,
                    posts_per_day: 3,
                    preferred_backend: "claude".to_string(),
                    created_at: now,
                    updated_at: now,
                })
            })
        });

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        subscription_repo
            .expect_create()
            .withf(|insert| insert.status == "incomplete" && insert.plan_type == "free")
            .times(1)
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        subscription_repo
            .expect_update()
            .withf(|_, update| update.stripe_customer_id.as_deref() == Some("cus_9"))
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_create_customer()
            .returning(|_, _| Box::pin(async { Ok("cus_9".to_string()) }));
        gateway
            .expect_create_checkout_session()
            .returning(|_, _, _| {
                Box::pin(async { Ok("https://checkout.stripe.com/pay/cs_1".to_string()) })
            });

        let use_case = use_case(
            subscription_repo,
            MockPaymentHistoryRepository::new(),
            MockWebhookEventRepository::new(),
            user_repo,
            gateway,
        );

        let session = use_case.checkout(user_id).await.unwrap();
        assert!(session.checkout_url.starts_with("https://checkout.stripe.com"));
    }

    #[tokio::test]
    async fn cancel_only_talks_to_the_provider() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Box::pin(async { Ok(Some(sample_subscription("sub_1"))) }));
        subscription_repo.expect_update().times(0);

        let mut gateway = MockStripeGateway::new();
        gateway
            .expect_cancel_at_period_end()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let use_case = use_case(
            subscription_repo,
            MockPaymentHistoryRepository::new(),
            MockWebhookEventRepository::new(),
            MockUserRepository::new(),
            gateway,
        );

        use_case.cancel(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_without_provider_subscription_is_not_found() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_find_by_user_id()
            .returning(|_| Box::pin(async { Ok(None) }));

        let use_case = use_case(
            subscription_repo,
            MockPaymentHistoryRepository::new(),
            MockWebhookEventRepository::new(),
            MockUserRepository::new(),
            MockStripeGateway::new(),
        );

        let result = use_case.cancel(Uuid::new_v4()).await;
        assert!(matches!(result, Err(BillingError::NothingToCancel)));
    }
}
