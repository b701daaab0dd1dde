pub mod oauth;

use anyhow::{Context, Result, anyhow};
use axum::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const X_API_BASE_URL: &str = "https://api.x.com/2";
pub const MAX_POST_CHARS: usize = 280;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XUserProfile {
    pub id: String,
    pub username: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct XPublicMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XPost {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub public_metrics: XPublicMetrics,
}

/// A search hit joined with its author's username from the includes block.
#[derive(Debug, Clone)]
pub struct XSearchHit {
    pub post: XPost,
    pub author_username: String,
}

#[async_trait]
#[automock]
pub trait XApiGateway {
    async fn fetch_me(&self, access_token: String) -> Result<XUserProfile>;
    async fn fetch_user_posts(
        &self,
        access_token: String,
        x_user_id: String,
        max_results: u32,
    ) -> Result<Vec<XPost>>;
    async fn search_recent(&self, query: String, max_results: u32) -> Result<Vec<XSearchHit>>;
    async fn create_post(&self, access_token: String, text: String) -> Result<String>;
    async fn fetch_post_metrics(
        &self,
        access_token: String,
        x_post_id: String,
    ) -> Result<XPublicMetrics>;
}

#[derive(Debug, Deserialize)]
struct UserDataEnvelope {
    data: XUserProfile,
}

#[derive(Debug, Deserialize)]
struct PostsEnvelope {
    #[serde(default)]
    data: Vec<XPost>,
    #[serde(default)]
    includes: Option<SearchIncludes>,
}

#[derive(Debug, Deserialize)]
struct SearchIncludes {
    #[serde(default)]
    users: Vec<XUserProfile>,
}

#[derive(Debug, Deserialize)]
struct SinglePostEnvelope {
    data: XPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPostEnvelope {
    data: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

pub struct XApiClient {
    http_client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl XApiClient {
    pub fn new(bearer_token: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: X_API_BASE_URL.to_string(),
            bearer_token,
        }
    }
}

#[async_trait]
impl XApiGateway for XApiClient {
    async fn fetch_me(&self, access_token: String) -> Result<XUserProfile> {
        let response = self
            .http_client
            .get(format!("{}/users/me", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .context("x api: fetching authenticated user failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "x api: /users/me returned status {}",
                response.status()
            ));
        }

        let envelope = response.json::<UserDataEnvelope>().await?;
        Ok(envelope.data)
    }

    async fn fetch_user_posts(
        &self,
        access_token: String,
        x_user_id: String,
        max_results: u32,
    ) -> Result<Vec<XPost>> {
        let response = self
            .http_client
            .get(format!("{}/users/{}/tweets", self.base_url, x_user_id))
            .bearer_auth(access_token)
            .query(&[
                ("max_results", max_results.to_string()),
                ("tweet.fields", "public_metrics,created_at".to_string()),
                ("exclude", "retweets,replies".to_string()),
            ])
            .send()
            .await
            .context("x api: fetching user timeline failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "x api: timeline fetch returned status {}",
                response.status()
            ));
        }

        let envelope = response.json::<PostsEnvelope>().await?;
        Ok(envelope.data)
    }

    async fn search_recent(&self, query: String, max_results: u32) -> Result<Vec<XSearchHit>> {
        let response = self
            .http_client
            .get(format!("{}/tweets/search/recent", self.base_url))
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("query", query),
                ("max_results", max_results.to_string()),
                ("tweet.fields", "public_metrics,author_id".to_string()),
                ("expansions", "author_id".to_string()),
                ("user.fields", "username".to_string()),
            ])
            .send()
            .await
            .context("x api: recent search failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "x api: recent search returned status {}",
                response.status()
            ));
        }

        let envelope = response.json::<PostsEnvelope>().await?;
        let authors = envelope.includes.map(|i| i.users).unwrap_or_default();

        let hits = envelope
            .data
            .into_iter()
            .map(|post| {
                let author_username = post
                    .author_id
                    .as_deref()
                    .and_then(|author_id| authors.iter().find(|u| u.id == author_id))
                    .map(|u| u.username.clone())
                    .unwrap_or_default();
                XSearchHit {
                    post,
                    author_username,
                }
            })
            .collect();

        Ok(hits)
    }

    async fn create_post(&self, access_token: String, text: String) -> Result<String> {
        // Pre-flight length check, counted in chars the way the platform does.
        if text.chars().count() > MAX_POST_CHARS {
            return Err(anyhow!(
                "x api: post is {} chars, limit is {}",
                text.chars().count(),
                MAX_POST_CHARS
            ));
        }

        let response = self
            .http_client
            .post(format!("{}/tweets", self.base_url))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .context("x api: creating post failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "x api: post creation returned status {}",
                response.status()
            ));
        }

        let envelope = response.json::<CreatedPostEnvelope>().await?;
        info!("x api: created post {}", envelope.data.id);

        Ok(envelope.data.id)
    }

    async fn fetch_post_metrics(
        &self,
        access_token: String,
        x_post_id: String,
    ) -> Result<XPublicMetrics> {
        let response = self
            .http_client
            .get(format!("{}/tweets/{}", self.base_url, x_post_id))
            .bearer_auth(access_token)
            .query(&[("tweet.fields", "public_metrics")])
            .send()
            .await
            .context("x api: fetching post metrics failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "x api: metrics fetch returned status {}",
                response.status()
            ));
        }

        let envelope = response.json::<SinglePostEnvelope>().await?;
        Ok(envelope.data.public_metrics)
    }
}
