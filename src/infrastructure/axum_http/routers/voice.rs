use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    ai::VoiceModelRegistry,
    application::usecases::{
        connect::{AccessTokenProvider, TokenService},
        voice::VoiceUseCase,
    },
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::{
            posts::PostRepository, subscriptions::SubscriptionRepository, users::UserRepository,
        },
        value_objects::voice::RemixRequestModel,
    },
    infrastructure::{
        axum_http::{auth::AuthUser, error_responses::error_response},
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                posts::PostPostgres, subscriptions::SubscriptionPostgres, users::UserPostgres,
            },
        },
    },
    security::token_cipher::TokenCipher,
    x_api::{XApiClient, XApiGateway, oauth::XOAuthClient},
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    token_cipher: Arc<TokenCipher>,
) -> Router {
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let oauth_gateway = Arc::new(XOAuthClient::new(config.x_oauth.clone()));
    let token_service = Arc::new(TokenService::new(
        Arc::clone(&user_repository),
        oauth_gateway,
        token_cipher,
    ));

    let voice_use_case = VoiceUseCase::new(
        user_repository,
        Arc::new(PostPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(XApiClient::new(config.x_oauth.bearer_token.clone())),
        token_service,
        Arc::new(VoiceModelRegistry::from_config(&config.ai)),
    );

    Router::new()
        .route("/analyze", post(analyze))
        .route("/remix", post(remix))
        .route("/drafts", get(drafts))
        .with_state(Arc::new(voice_use_case))
}

pub async fn analyze<U, P, S, X, A>(
    State(voice_use_case): State<Arc<VoiceUseCase<U, P, S, X, A>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
{
    match voice_use_case.analyze(auth.user_id).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn remix<U, P, S, X, A>(
    State(voice_use_case): State<Arc<VoiceUseCase<U, P, S, X, A>>>,
    auth: AuthUser,
    Json(request): Json<RemixRequestModel>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
{
    match voice_use_case.remix(auth.user_id, request).await {
        Ok(remixed) => (StatusCode::CREATED, Json(remixed)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn drafts<U, P, S, X, A>(
    State(voice_use_case): State<Arc<VoiceUseCase<U, P, S, X, A>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    P: PostRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    X: XApiGateway + Send + Sync + 'static,
    A: AccessTokenProvider + 'static,
{
    match voice_use_case.drafts(auth.user_id).await {
        Ok(drafts) => (StatusCode::OK, Json(drafts)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}
