use std::sync::Arc;

use anyhow::Result;
use prism::config::config_loader;
use prism::infrastructure::{
    axum_http::http_serve,
    postgres::postgres_connection,
    redis_store::{self, RedisStore},
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");

    let redis_connection = redis_store::establish_connection(&dotenvy_env.redis.url).await?;
    info!("Redis connection has been established");

    http_serve::start(
        Arc::new(dotenvy_env),
        Arc::new(postgres_pool),
        Arc::new(RedisStore::new(redis_connection)),
    )
    .await?;

    Ok(())
}
