use anyhow::{Ok, Result};

use super::config_model::{DotEnvyConfig, EncryptionSecret, SessionSecret};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = super::config_model::BackendServer {
        port: std::env::var("SERVER_PORT_BACKEND")
            .expect("SERVER_PORT_BACKEND is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let worker_server = super::config_model::WorkerServer {
        port: std::env::var("SERVER_PORT_WORKER")
            .expect("SERVER_PORT_WORKER is invalid")
            .parse()?,
        poll_interval_seconds: std::env::var("WORKER_POLL_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?,
    };

    let database = super::config_model::Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let redis = super::config_model::Redis {
        url: std::env::var("REDIS_URL").expect("REDIS_URL is invalid"),
    };

    let x_oauth = super::config_model::XOAuth {
        client_id: std::env::var("X_CLIENT_ID").expect("X_CLIENT_ID is invalid"),
        client_secret: std::env::var("X_CLIENT_SECRET").expect("X_CLIENT_SECRET is invalid"),
        redirect_uri: std::env::var("X_REDIRECT_URI").expect("X_REDIRECT_URI is invalid"),
        bearer_token: std::env::var("X_BEARER_TOKEN").expect("X_BEARER_TOKEN is invalid"),
    };

    let stripe = super::config_model::Stripe {
        secret_key: std::env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY is invalid"),
        webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
            .expect("STRIPE_WEBHOOK_SECRET is invalid"),
        pro_price_id: std::env::var("STRIPE_PRO_PRICE_ID")
            .expect("STRIPE_PRO_PRICE_ID is invalid"),
        success_url: std::env::var("STRIPE_SUCCESS_URL").expect("STRIPE_SUCCESS_URL is invalid"),
        cancel_url: std::env::var("STRIPE_CANCEL_URL").expect("STRIPE_CANCEL_URL is invalid"),
    };

    let ai = super::config_model::Ai {
        anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
            .expect("ANTHROPIC_API_KEY is invalid"),
        mistral_api_key: std::env::var("MISTRAL_API_KEY").expect("MISTRAL_API_KEY is invalid"),
        grok_api_key: std::env::var("GROK_API_KEY").expect("GROK_API_KEY is invalid"),
        grok_base_url: std::env::var("GROK_BASE_URL")
            .unwrap_or_else(|_| "https://api.x.ai/v1".to_string()),
    };

    Ok(DotEnvyConfig {
        backend_server,
        worker_server,
        database,
        redis,
        x_oauth,
        stripe,
        ai,
    })
}

pub fn get_session_secret() -> Result<SessionSecret> {
    dotenvy::dotenv().ok();

    Ok(SessionSecret {
        secret: std::env::var("JWT_SESSION_SECRET").expect("JWT_SESSION_SECRET is invalid"),
        expiration_minutes: std::env::var("JWT_EXPIRATION_MINUTES")
            .unwrap_or_else(|_| "1440".to_string())
            .parse()?,
    })
}

pub fn get_encryption_secret() -> Result<EncryptionSecret> {
    dotenvy::dotenv().ok();

    Ok(EncryptionSecret {
        key: std::env::var("TOKEN_ENCRYPTION_KEY").expect("TOKEN_ENCRYPTION_KEY is invalid"),
    })
}
