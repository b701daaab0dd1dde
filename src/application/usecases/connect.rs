use std::sync::Arc;

use anyhow::{Result as AnyResult, anyhow};
use axum::async_trait;
use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        entities::users::{InsertUserEntity, UpdateUserTokensEntity, UserEntity},
        repositories::users::UserRepository,
        value_objects::{
            account_model::{AuthorizeRedirectDto, ConnectedAccountDto, UpdateSettingsModel},
            enums::ai_backends::AiBackend,
        },
    },
    security::{
        pkce::{PkcePair, generate_state_token},
        token_cipher::{CipherError, TokenCipher},
    },
    x_api::{XApiGateway, oauth::TokenGrant},
};

pub const STATE_TTL_SECONDS: u64 = 600;

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECONDS: i64 = 300;

pub fn oauth_state_key(state: &str) -> String {
    format!("oauth_state:{}", state)
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait OAuthGateway: Send + Sync {
    fn authorize_url(&self, state: &str, code_challenge: &str) -> AnyResult<String>;
    async fn exchange_code(&self, code: String, code_verifier: String) -> AnyResult<TokenGrant>;
    async fn refresh(&self, refresh_token: String) -> AnyResult<TokenGrant>;
    async fn revoke(&self, access_token: String) -> bool;
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait StateStore: Send + Sync {
    async fn put(&self, key: String, value: String, ttl_seconds: u64) -> AnyResult<()>;
    /// Reads and deletes atomically so a state token redeems at most once.
    async fn take(&self, key: String) -> AnyResult<Option<String>>;
}

/// Fire-and-forget hook that kicks off voice analysis after a connect.
#[cfg_attr(test, mockall::automock)]
pub trait AnalysisTrigger: Send + Sync {
    fn trigger(&self, user_id: Uuid);
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait AccessTokenProvider: Send + Sync {
    /// Returns a decrypted access token, refreshing it first when it is
    /// about to expire.
    async fn access_token_for(&self, user_id: Uuid) -> AnyResult<String>;
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("unknown or expired oauth state")]
    InvalidState,
    #[error("oauth code exchange failed")]
    OAuthExchange(#[source] anyhow::Error),
    #[error("no connected account")]
    NotConnected,
    #[error("stored tokens could not be decrypted")]
    TokenDecryption,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ConnectError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ConnectError::InvalidState
            | ConnectError::OAuthExchange(_)
            | ConnectError::Validation(_) => StatusCode::BAD_REQUEST,
            ConnectError::NotConnected | ConnectError::TokenDecryption => {
                StatusCode::UNAUTHORIZED
            }
            ConnectError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ConnectResult<T> = std::result::Result<T, ConnectError>;

pub struct ConnectUseCase<U, O, S, X, T>
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
    S: StateStore + 'static,
    X: XApiGateway + Send + Sync + 'static,
    T: AnalysisTrigger + 'static,
{
    user_repository: Arc<U>,
    oauth_gateway: Arc<O>,
    state_store: Arc<S>,
    x_api_gateway: Arc<X>,
    analysis_trigger: Arc<T>,
    token_cipher: Arc<TokenCipher>,
}

impl<U, O, S, X, T> ConnectUseCase<U, O, S, X, T>
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
    S: StateStore + 'static,
    X: XApiGateway + Send + Sync + 'static,
    T: AnalysisTrigger + 'static,
{
    pub fn new(
        user_repository: Arc<U>,
        oauth_gateway: Arc<O>,
        state_store: Arc<S>,
        x_api_gateway: Arc<X>,
        analysis_trigger: Arc<T>,
        token_cipher: Arc<TokenCipher>,
    ) -> Self {
        Self {
            user_repository,
            oauth_gateway,
            state_store,
            x_api_gateway,
            analysis_trigger,
            token_cipher,
        }
    }

    /// Starts the authorization flow: a fresh PKCE pair and state token,
    /// with the verifier parked server-side until the callback.
    pub async fn begin(&self) -> ConnectResult<AuthorizeRedirectDto> {
        let pkce_pair = PkcePair::generate();
        let state = generate_state_token();

        self.state_store
            .put(
                oauth_state_key(&state),
                pkce_pair.verifier.clone(),
                STATE_TTL_SECONDS,
            )
            .await
            .map_err(|err| {
                error!(store_error = ?err, "connect: failed to store oauth state");
                ConnectError::Internal(err)
            })?;

        let authorize_url = self
            .oauth_gateway
            .authorize_url(&state, &pkce_pair.challenge)?;

        info!("connect: authorization flow started");
        Ok(AuthorizeRedirectDto {
            authorize_url,
            state,
        })
    }

    /// Callback leg: redeem the state, exchange the code, then upsert the
    /// account with encrypted tokens. First-time connects trigger a
    /// background voice analysis.
    pub async fn complete(&self, code: String, state: String) -> ConnectResult<Uuid> {
        // The state must redeem before anything touches the provider, so a
        // forged callback never reaches the token endpoint.
        let code_verifier = self
            .state_store
            .take(oauth_state_key(&state))
            .await
            .map_err(ConnectError::Internal)?
            .ok_or_else(|| {
                warn!("connect: callback with unknown or expired state");
                ConnectError::InvalidState
            })?;

        let grant = self
            .oauth_gateway
            .exchange_code(code, code_verifier)
            .await
            .map_err(|err| {
                warn!(exchange_error = ?err, "connect: oauth code exchange failed");
                ConnectError::OAuthExchange(err)
            })?;

        let profile = self
            .x_api_gateway
            .fetch_me(grant.access_token.clone())
            .await
            .map_err(|err| {
                error!(x_api_error = ?err, "connect: failed to fetch connected profile");
                ConnectError::Internal(err)
            })?;

        let (encrypted_access, encrypted_refresh, expires_at) = self.seal_grant(&grant)?;

        let existing = self
            .user_repository
            .find_by_x_user_id(profile.id.clone())
            .await
            .map_err(|err| {
                error!(db_error = ?err, "connect: account lookup failed");
                ConnectError::Internal(err)
            })?;

        let user_id = match existing {
            Some(user) => {
                self.user_repository
                    .update_tokens(
                        user.id,
                        UpdateUserTokensEntity {
                            x_username: profile.username.clone(),
                            x_access_token: Some(encrypted_access),
                            x_refresh_token: encrypted_refresh,
                            x_token_expires_at: expires_at,
                            updated_at: Utc::now(),
                        },
                    )
                    .await
                    .map_err(|err| {
                        error!(%user.id, db_error = ?err, "connect: token update failed");
                        ConnectError::Internal(err)
                    })?;
                user.id
            }
            None => {
                let user_id = self
                    .user_repository
                    .create(InsertUserEntity {
                        email: None,
                        x_user_id: profile.id.clone(),
                        x_username: profile.username.clone(),
                        x_access_token: Some(encrypted_access),
                        x_refresh_token: encrypted_refresh,
                        x_token_expires_at: expires_at,
                        preferred_backend: AiBackend::default().to_string(),
                    })
                    .await
                    .map_err(|err| {
                        error!(db_error = ?err, "connect: account creation failed");
                        ConnectError::Internal(err)
                    })?;

                self.analysis_trigger.trigger(user_id);
                user_id
            }
        };

        info!(%user_id, x_username = %profile.username, "connect: account connected");
        Ok(user_id)
    }

    pub async fn me(&self, user_id: Uuid) -> ConnectResult<ConnectedAccountDto> {
        let user = self.load_user(user_id).await?;
        Ok(ConnectedAccountDto::from_entity(&user))
    }

    pub async fn update_settings(
        &self,
        user_id: Uuid,
        settings: UpdateSettingsModel,
    ) -> ConnectResult<()> {
        if let Some(posts_per_day) = settings.posts_per_day {
            if !(1..=24).contains(&posts_per_day) {
                return Err(ConnectError::Validation(
                    "posts_per_day must be between 1 and 24".to_string(),
                ));
            }
        }

        if let Some(backend) = settings.preferred_backend.as_deref() {
            if AiBackend::from_str(backend).is_none() {
                return Err(ConnectError::Validation(format!(
                    "unknown backend: {}",
                    backend
                )));
            }
        }

        self.user_repository
            .update_settings(
                user_id,
                crate::domain::entities::users::UpdateUserSettingsEntity {
                    auto_pilot_enabled: settings.auto_pilot_enabled,
                    posts_per_day: settings.posts_per_day,
                    preferred_backend: settings.preferred_backend,
                    updated_at: Utc::now(),
                },
            )
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "connect: settings update failed");
                ConnectError::Internal(err)
            })?;

        info!(%user_id, "connect: settings updated");
        Ok(())
    }

    /// Revokes the provider token on a best-effort basis, then always drops
    /// the stored ciphertext.
    pub async fn disconnect(&self, user_id: Uuid) -> ConnectResult<()> {
        let user = self.load_user(user_id).await?;

        if let Some(encrypted_access) = user.x_access_token.as_deref() {
            match self.token_cipher.decrypt(encrypted_access) {
                Ok(access_token) => {
                    self.oauth_gateway.revoke(access_token).await;
                }
                Err(err) => {
                    warn!(%user_id, cipher_error = ?err, "connect: skipping revoke, token unreadable");
                }
            }
        }

        self.user_repository.clear_tokens(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "connect: failed to clear tokens");
            ConnectError::Internal(err)
        })?;

        info!(%user_id, "connect: account disconnected");
        Ok(())
    }

    async fn load_user(&self, user_id: Uuid) -> ConnectResult<UserEntity> {
        self.user_repository.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "connect: user lookup failed");
            ConnectError::Internal(err)
        })
    }

    fn seal_grant(
        &self,
        grant: &TokenGrant,
    ) -> ConnectResult<(String, Option<String>, Option<chrono::DateTime<Utc>>)> {
        let encrypted_access = self
            .token_cipher
            .encrypt(&grant.access_token)
            .map_err(|err| ConnectError::Internal(anyhow!(err)))?;
        let encrypted_refresh = grant
            .refresh_token
            .as_deref()
            .map(|token| self.token_cipher.encrypt(token))
            .transpose()
            .map_err(|err| ConnectError::Internal(anyhow!(err)))?;
        let expires_at = Some(Utc::now() + Duration::seconds(grant.expires_in));

        Ok((encrypted_access, encrypted_refresh, expires_at))
    }
}

/// Standalone token access for the worker and background jobs, sharing the
/// cipher and refresh policy with the connect flow.
pub struct TokenService<U, O>
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
{
    user_repository: Arc<U>,
    oauth_gateway: Arc<O>,
    token_cipher: Arc<TokenCipher>,
}

impl<U, O> TokenService<U, O>
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
{
    pub fn new(user_repository: Arc<U>, oauth_gateway: Arc<O>, token_cipher: Arc<TokenCipher>) -> Self {
        Self {
            user_repository,
            oauth_gateway,
            token_cipher,
        }
    }

    fn seal_grant(
        &self,
        grant: &TokenGrant,
    ) -> AnyResult<(String, Option<String>, Option<chrono::DateTime<Utc>>)> {
        let encrypted_access = self
            .token_cipher
            .encrypt(&grant.access_token)
            .map_err(|err| anyhow!(err))?;
        let encrypted_refresh = grant
            .refresh_token
            .as_deref()
            .map(|token| self.token_cipher.encrypt(token))
            .transpose()
            .map_err(|err| anyhow!(err))?;
        let expires_at = Some(Utc::now() + Duration::seconds(grant.expires_in));

        Ok((encrypted_access, encrypted_refresh, expires_at))
    }
}

#[async_trait]
impl<U, O> AccessTokenProvider for TokenService<U, O>
where
    U: UserRepository + Send + Sync + 'static,
    O: OAuthGateway + 'static,
{
    async fn access_token_for(&self, user_id: Uuid) -> AnyResult<String> {
        let user = self.user_repository.find_by_id(user_id).await?;

        let encrypted_access = user
            .x_access_token
            .as_deref()
            .ok_or_else(|| anyhow!(ConnectError::NotConnected))?;

        let access_token = self
            .token_cipher
            .decrypt(encrypted_access)
            .map_err(|_: CipherError| anyhow!(ConnectError::TokenDecryption))?;

        let near_expiry = user
            .x_token_expires_at
            .map(|expires_at| expires_at - Utc::now() < Duration::seconds(REFRESH_MARGIN_SECONDS))
            .unwrap_or(false);

        if !near_expiry {
            return Ok(access_token);
        }

        let Some(encrypted_refresh) = user.x_refresh_token.as_deref() else {
            // No refresh token, run with what we have until the provider
            // rejects it.
            return Ok(access_token);
        };

        let refresh_token = self
            .token_cipher
            .decrypt(encrypted_refresh)
            .map_err(|_: CipherError| anyhow!(ConnectError::TokenDecryption))?;

        info!(%user_id, "connect: refreshing access token near expiry");
        let grant = self.oauth_gateway.refresh(refresh_token).await?;

        let fresh_access = grant.access_token.clone();
        let (encrypted_access, encrypted_refresh, expires_at) = self.seal_grant(&grant)?;

        self.user_repository
            .update_tokens(
                user_id,
                UpdateUserTokensEntity {
                    x_username: user.x_username,
                    x_access_token: Some(encrypted_access),
                    x_refresh_token: encrypted_refresh.or(user.x_refresh_token),
                    x_token_expires_at: expires_at,
                    updated_at: Utc::now(),
                },
            )
            .await?;

        Ok(fresh_access)
    }
}
