use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::config_loader;

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[derive(Debug)]
pub struct AuthError(anyhow::Error);

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError(err)
    }
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::UNAUTHORIZED,
            format!("Unauthorized: {}", self.0),
        )
            .into_response()
    }
}

/// Issues the session JWT returned from the OAuth callback.
pub fn create_session_token(user_id: Uuid) -> Result<String, AuthError> {
    let session_secret = config_loader::get_session_secret()
        .map_err(|e| anyhow::anyhow!("Failed to load session secret: {}", e))?;

    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::minutes(session_secret.expiration_minutes)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(session_secret.secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("JWT encoding failed: {}", e))?;

    Ok(token)
}

pub fn validate_session_token(token: &str) -> Result<SessionClaims, AuthError> {
    let session_secret = config_loader::get_session_secret()
        .map_err(|e| anyhow::anyhow!("Failed to load session secret: {}", e))?;

    let decoding_key = DecodingKey::from_secret(session_secret.secret.as_bytes());
    let validation = Validation::new(jsonwebtoken::Algorithm::HS256);

    let token_data = decode::<SessionClaims>(token, &decoding_key, &validation)
        .map_err(|e| anyhow::anyhow!("JWT validation failed: {}", e))?;

    Ok(token_data.claims)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing Authorization header".to_string(),
            ))?;

        let auth_str = auth_header.to_str().map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header".to_string(),
            )
        })?;

        if !auth_str.starts_with("Bearer ") {
            return Err((
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header format".to_string(),
            ));
        }

        let token = &auth_str[7..];

        let claims = validate_session_token(token)
            .map_err(|e| (StatusCode::UNAUTHORIZED, e.0.to_string()))?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                "Invalid user ID in token".to_string(),
            )
        })?;

        Ok(AuthUser { user_id })
    }
}
