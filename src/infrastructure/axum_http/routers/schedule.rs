use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    application::{
        rate_limit::{CounterStore, RateLimiter},
        usecases::{
            connect::{AccessTokenProvider, TokenService},
            scheduling::SchedulingUseCase,
        },
    },
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{posts::PostRepository, scheduled_posts::ScheduledPostRepository},
        value_objects::scheduling_model::SchedulePostModel,
    },
    infrastructure::{
        axum_http::{auth::AuthUser, error_responses::error_response},
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                posts::PostPostgres, scheduled_posts::ScheduledPostPostgres, users::UserPostgres,
            },
        },
        redis_store::RedisStore,
    },
    security::token_cipher::TokenCipher,
    x_api::{XApiClient, XApiGateway, oauth::XOAuthClient},
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    redis_store: Arc<RedisStore>,
    config: Arc<DotEnvyConfig>,
    token_cipher: Arc<TokenCipher>,
) -> Router {
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let oauth_gateway = Arc::new(XOAuthClient::new(config.x_oauth.clone()));
    let token_service = Arc::new(TokenService::new(
        user_repository,
        oauth_gateway,
        token_cipher,
    ));

    let scheduling_use_case = SchedulingUseCase::new(
        Arc::new(ScheduledPostPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PostPostgres::new(Arc::clone(&db_pool))),
        Arc::new(XApiClient::new(config.x_oauth.bearer_token.clone())),
        token_service,
        RateLimiter::new(redis_store),
    );

    Router::new()
        .route("/", post(schedule).get(queue))
        .route("/analytics", get(analytics))
        .route("/:scheduled_post_id", delete(remove))
        .route("/:scheduled_post_id/metrics", get(post_metrics))
        .with_state(Arc::new(scheduling_use_case))
}

#[derive(Debug, serde::Serialize)]
pub struct ScheduledResponse {
    pub scheduled_post_id: Uuid,
}

pub async fn schedule<SP, P, X, A, C>(
    State(scheduling_use_case): State<Arc<SchedulingUseCase<SP, P, X, A, C>>>,
    auth: AuthUser,
    Json(model): Json<SchedulePostModel>,
) -> impl IntoResponse
where
    SP: ScheduledPostRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
    C: CounterStore + Send + Sync + 'static,
{
    match scheduling_use_case.schedule(auth.user_id, model).await {
        Ok(scheduled_post_id) => (
            StatusCode::CREATED,
            Json(ScheduledResponse { scheduled_post_id }),
        )
            .into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn queue<SP, P, X, A, C>(
    State(scheduling_use_case): State<Arc<SchedulingUseCase<SP, P, X, A, C>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    SP: ScheduledPostRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
    C: CounterStore + Send + Sync + 'static,
{
    match scheduling_use_case.queue(auth.user_id).await {
        Ok(queue) => (StatusCode::OK, Json(queue)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn analytics<SP, P, X, A, C>(
    State(scheduling_use_case): State<Arc<SchedulingUseCase<SP, P, X, A, C>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    SP: ScheduledPostRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
    C: CounterStore + Send + Sync + 'static,
{
    match scheduling_use_case.analytics(auth.user_id).await {
        Ok(analytics) => (StatusCode::OK, Json(analytics)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn post_metrics<SP, P, X, A, C>(
    State(scheduling_use_case): State<Arc<SchedulingUseCase<SP, P, X, A, C>>>,
    auth: AuthUser,
    Path(scheduled_post_id): Path<Uuid>,
) -> impl IntoResponse
where
    SP: ScheduledPostRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
    C: CounterStore + Send + Sync + 'static,
{
    match scheduling_use_case
        .post_metrics(auth.user_id, scheduled_post_id)
        .await
    {
        Ok(metrics) => (StatusCode::OK, Json(metrics)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn remove<SP, P, X, A, C>(
    State(scheduling_use_case): State<Arc<SchedulingUseCase<SP, P, X, A, C>>>,
    auth: AuthUser,
    Path(scheduled_post_id): Path<Uuid>,
) -> impl IntoResponse
where
    SP: ScheduledPostRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
    C: CounterStore + Send + Sync + 'static,
{
    match scheduling_use_case
        .remove(auth.user_id, scheduled_post_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}
