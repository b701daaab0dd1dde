use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    ai::VoiceModelRegistry,
    application::usecases::{
        connect::{
            AnalysisTrigger, ConnectUseCase, OAuthGateway, StateStore, TokenService,
        },
        voice::{BackgroundAnalysis, VoiceUseCase},
    },
    config::config_model::DotEnvyConfig,
    domain::{
        repositories::users::UserRepository,
        value_objects::account_model::UpdateSettingsModel,
    },
    infrastructure::{
        axum_http::{auth::AuthUser, auth::create_session_token, error_responses::error_response},
        postgres::{
            postgres_connection::PgPoolSquad,
            repositories::{
                posts::PostPostgres, subscriptions::SubscriptionPostgres, users::UserPostgres,
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
    let x_api_gateway = Arc::new(XApiClient::new(config.x_oauth.bearer_token.clone()));
    let registry = Arc::new(VoiceModelRegistry::from_config(&config.ai));

    let token_service = Arc::new(TokenService::new(
        Arc::clone(&user_repository),
        Arc::clone(&oauth_gateway),
        Arc::clone(&token_cipher),
    ));
    let voice_use_case = Arc::new(VoiceUseCase::new(
        Arc::clone(&user_repository),
        Arc::new(PostPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&x_api_gateway),
        token_service,
        registry,
    ));
    let analysis_trigger = Arc::new(BackgroundAnalysis::new(voice_use_case));

    let connect_use_case = ConnectUseCase::new(
        user_repository,
        oauth_gateway,
        redis_store,
        x_api_gateway,
        analysis_trigger,
        token_cipher,
    );

    Router::new()
        .route("/connect", get(connect))
        .route("/callback", get(callback))
        .route("/me", get(me))
        .route("/settings", patch(update_settings))
        .route("/disconnect", post(disconnect))
        .with_state(Arc::new(connect_use_case))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
}

pub async fn connect<U, O, S, X, T>(
    State(connect_use_case): State<Arc<ConnectUseCase<U, O, S, X, T>>>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
    S: StateStore + 'static,
    X: XApiGateway + Send + Sync + 'static,
    T: AnalysisTrigger + 'static,
{
    match connect_use_case.begin().await {
        Ok(redirect) => (StatusCode::OK, Json(redirect)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn callback<U, O, S, X, T>(
    State(connect_use_case): State<Arc<ConnectUseCase<U, O, S, X, T>>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
    S: StateStore + 'static,
    X: XApiGateway + Send + Sync + 'static,
    T: AnalysisTrigger + 'static,
{
    match connect_use_case.complete(params.code, params.state).await {
        Ok(user_id) => match create_session_token(user_id) {
            Ok(token) => (StatusCode::OK, Json(SessionResponse { token })).into_response(),
            Err(err) => err.into_response(),
        },
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn me<U, O, S, X, T>(
    State(connect_use_case): State<Arc<ConnectUseCase<U, O, S, X, T>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
    S: StateStore + 'static,
    X: XApiGateway + Send + Sync + 'static,
    T: AnalysisTrigger + 'static,
{
    match connect_use_case.me(auth.user_id).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn update_settings<U, O, S, X, T>(
    State(connect_use_case): State<Arc<ConnectUseCase<U, O, S, X, T>>>,
    auth: AuthUser,
    Json(settings): Json<UpdateSettingsModel>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
    S: StateStore + 'static,
    X: XApiGateway + Send + Sync + 'static,
    T: AnalysisTrigger + 'static,
{
    match connect_use_case.update_settings(auth.user_id, settings).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}

pub async fn disconnect<U, O, S, X, T>(
    State(connect_use_case): State<Arc<ConnectUseCase<U, O, S, X, T>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
    S: StateStore + 'static,
    X: XApiGateway + Send + Sync + 'static,
    T: AnalysisTrigger + 'static,
{
    match connect_use_case.disconnect(auth.user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err.status_code(), err.to_string()),
    }
}
