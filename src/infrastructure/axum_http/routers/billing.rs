use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    application::usecases::billing::{BillingUseCase, StripeGateway, WebhookOutcome},
    config::config_model::DotEnvyConfig,
    domain::repositories::{
        payment_history::PaymentHistoryRepository, subscriptions::SubscriptionRepository,
        users::UserRepository, webhook_events::WebhookEventRepository,
    },
    infrastructure::{
        axum_http::{auth::AuthUser, error_responses::error_response},
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                payment_history::PaymentHistoryPostgres, subscriptions::SubscriptionPostgres,
                users::UserPostgres, webhook_events::WebhookEventPostgres,
            },
        },
    },
    payments::stripe_client::StripeClient,
};

pub fn routes(db_pool: Arc<PgPoolSquad>, config: Arc<DotEnvyConfig>) -> Router {
    let stripe_gateway = Arc::new(StripeClient::new(
        config.stripe.secret_key.clone(),
        config.stripe.webhook_secret.clone(),
        config.stripe.success_url.clone(),
        config.stripe.cancel_url.clone(),
    ));

    let billing_use_case = BillingUseCase::new(
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentHistoryPostgres::new(Arc::clone(&db_pool))),
        Arc::new(WebhookEventPostgres::new(Arc::clone(&db_pool))),
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        stripe_gateway,
        config.stripe.pro_price_id.clone(),
    );

    Router::new()
        .route("/subscription", get(current_subscription))
        .route("/checkout", post(checkout))
        .route("/cancel", post(cancel))
        .route("/webhook", post(webhook))
        .with_state(Arc::new(billing_use_case))
}

pub async fn current_subscription<S, P, W, U, G>(
    State(billing_use_case): State<Arc<BillingUseCase<S, P, W, U, G>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentHistoryRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    match billing_use_case.current_subscription(auth.user_id).await {
        Ok(subscription) => (StatusCode::OK, Json(subscription)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn checkout<S, P, W, U, G>(
    State(billing_use_case): State<Arc<BillingUseCase<S, P, W, U, G>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentHistoryRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    match billing_use_case.checkout(auth.user_id).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn cancel<S, P, W, U, G>(
    State(billing_use_case): State<Arc<BillingUseCase<S, P, W, U, G>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentHistoryRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    match billing_use_case.cancel(auth.user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

/// Provider-facing endpoint. Authenticated by the signature header, not by
/// a session token. Non-2xx tells the provider to redeliver.
pub async fn webhook<S, P, W, U, G>(
    State(billing_use_case): State<Arc<BillingUseCase<S, P, W, U, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse
where
    S: SubscriptionRepository + Send + Sync + 'static,
    P: PaymentHistoryRepository + Send + Sync + 'static,
    W: WebhookEventRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: StripeGateway + 'static,
{
    let signature_header = match headers
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
    {
        Some(header) => header.to_string(),
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Missing Stripe-Signature header".to_string(),
            );
        }
    };

    match billing_use_case
        .handle_webhook(body.to_vec(), signature_header)
        .await
    {
        Ok(WebhookOutcome::Processed)
        | Ok(WebhookOutcome::AlreadyProcessed)
        | Ok(WebhookOutcome::Ignored) => StatusCode::OK.into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}
