use std::sync::Arc;

use anyhow::Result;
use prism::application::{rate_limit::RateLimiter, usecases::connect::TokenService};
use prism::application::usecases::scheduling::SchedulingUseCase;
use prism::config::config_loader;
use prism::infrastructure::{
    postgres::{
        postgres_connection,
        repositories::{
            posts::PostPostgres, scheduled_posts::ScheduledPostPostgres, users::UserPostgres,
        },
    },
    redis_store::{self, RedisStore},
};
use prism::security::token_cipher::TokenCipher;
use prism::worker::{dispatch_loop, health_server};
use prism::x_api::{XApiClient, oauth::XOAuthClient};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let dotenvy_env = Arc::new(config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");
    let db_pool = Arc::new(postgres_pool);

    let redis_connection = redis_store::establish_connection(&dotenvy_env.redis.url).await?;
    info!("Redis connection has been established");
    let redis_store = Arc::new(RedisStore::new(redis_connection));

    let encryption_secret = config_loader::get_encryption_secret()?;
    let token_cipher = Arc::new(TokenCipher::new(&encryption_secret.key)?);

    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let oauth_gateway = Arc::new(XOAuthClient::new(dotenvy_env.x_oauth.clone()));
    let token_service = Arc::new(TokenService::new(
        user_repository,
        oauth_gateway,
        token_cipher,
    ));

    let scheduled_post_repository = Arc::new(ScheduledPostPostgres::new(Arc::clone(&db_pool)));
    let scheduling_use_case = Arc::new(SchedulingUseCase::new(
        Arc::clone(&scheduled_post_repository),
        Arc::new(PostPostgres::new(Arc::clone(&db_pool))),
        Arc::new(XApiClient::new(dotenvy_env.x_oauth.bearer_token.clone())),
        token_service,
        RateLimiter::new(redis_store),
    ));

    let dispatch = tokio::spawn(dispatch_loop::run(
        scheduled_post_repository,
        scheduling_use_case,
        dotenvy_env.worker_server.poll_interval_seconds,
    ));

    let health = tokio::spawn(health_server::start(Arc::clone(&dotenvy_env)));

    tokio::select! {
        result = dispatch => result??,
        result = health => result??,
    };

    Ok(())
}
