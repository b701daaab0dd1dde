use anyhow::{Context, Result, anyhow};
use axum::async_trait;
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::application::usecases::connect::OAuthGateway;
use crate::config::config_model::XOAuth;
use crate::security::pkce::CODE_CHALLENGE_METHOD;

pub const AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
pub const TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
pub const REVOKE_URL: &str = "https://api.twitter.com/2/oauth2/revoke";

pub const OAUTH_SCOPES: &str =
    "tweet.read tweet.write users.read follows.read follows.write offline.access";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

pub struct XOAuthClient {
    http_client: reqwest::Client,
    config: XOAuth,
}

impl XOAuthClient {
    pub fn new(config: XOAuth) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl OAuthGateway for XOAuthClient {
    fn authorize_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        let mut url = Url::parse(AUTHORIZE_URL)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", OAUTH_SCOPES)
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: String, code_verifier: String) -> Result<TokenGrant> {
        let response = self
            .http_client
            .post(TOKEN_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", &self.config.redirect_uri),
                ("client_id", &self.config.client_id),
                ("code_verifier", &code_verifier),
            ])
            .send()
            .await
            .context("x oauth: token exchange request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "x oauth: token exchange returned status {}",
                response.status()
            ));
        }

        let grant = response.json::<TokenGrant>().await?;
        Ok(grant)
    }

    async fn refresh(&self, refresh_token: String) -> Result<TokenGrant> {
        let response = self
            .http_client
            .post(TOKEN_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
                ("client_id", &self.config.client_id),
            ])
            .send()
            .await
            .context("x oauth: token refresh request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "x oauth: token refresh returned status {}",
                response.status()
            ));
        }

        let grant = response.json::<TokenGrant>().await?;
        Ok(grant)
    }

    /// Best effort: a revocation failure must not block a disconnect.
    async fn revoke(&self, access_token: String) -> bool {
        let result = self
            .http_client
            .post(REVOKE_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("token", access_token.as_str()),
                ("token_type_hint", "access_token"),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(
                    "x oauth: revoke returned status {}, continuing",
                    response.status()
                );
                false
            }
            Err(err) => {
                warn!(revoke_error = ?err, "x oauth: revoke request failed, continuing");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> XOAuth {
        XOAuth {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "https://app.example.com/auth/callback".to_string(),
            bearer_token: "bearer".to_string(),
        }
    }

    #[test]
    fn authorize_url_carries_pkce_and_state() {
        let client = XOAuthClient::new(sample_config());

        let url = client.authorize_url("state-token", "challenge-value").unwrap();
        let parsed = Url::parse(&url).unwrap();

        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&("state".to_string(), "state-token".to_string())));
        assert!(pairs.contains(&("code_challenge".to_string(), "challenge-value".to_string())));
        assert!(pairs.contains(&(
            "code_challenge_method".to_string(),
            CODE_CHALLENGE_METHOD.to_string()
        )));
    }

    #[test]
    fn scopes_include_offline_access_for_refresh_tokens() {
        assert!(OAUTH_SCOPES.contains("offline.access"));
        assert!(OAUTH_SCOPES.contains("tweet.write"));
    }
}
