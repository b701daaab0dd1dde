use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    config::{config_loader, config_model::DotEnvyConfig},
    infrastructure::{
        axum_http::{default_routers, routers},
        postgres::postgres_connection::PgPoolSquad,
        redis_store::RedisStore,
    },
    security::token_cipher::TokenCipher,
};

pub async fn start(
    config: Arc<DotEnvyConfig>,
    db_pool: Arc<PgPoolSquad>,
    redis_store: Arc<RedisStore>,
) -> Result<()> {
    let encryption_secret = config_loader::get_encryption_secret()?;
    let token_cipher = Arc::new(TokenCipher::new(&encryption_secret.key)?);

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/auth",
            routers::auth::routes(
                Arc::clone(&db_pool),
                Arc::clone(&redis_store),
                Arc::clone(&config),
                Arc::clone(&token_cipher),
            ),
        )
        .nest(
            "/api/v1/voice",
            routers::voice::routes(
                Arc::clone(&db_pool),
                Arc::clone(&config),
                Arc::clone(&token_cipher),
            ),
        )
        .nest(
            "/api/v1/discovery",
            routers::discovery::routes(
                Arc::clone(&db_pool),
                Arc::clone(&config),
                Arc::clone(&token_cipher),
            ),
        )
        .nest(
            "/api/v1/schedule",
            routers::schedule::routes(
                Arc::clone(&db_pool),
                Arc::clone(&redis_store),
                Arc::clone(&config),
                Arc::clone(&token_cipher),
            ),
        )
        .nest(
            "/api/v1/billing",
            routers::billing::routes(Arc::clone(&db_pool), Arc::clone(&config)),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                ])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any), // TODO Add the domain later
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
