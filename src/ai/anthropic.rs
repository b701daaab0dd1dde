use anyhow::{Context, Result, anyhow};
use axum::async_trait;
use serde::Deserialize;

use crate::ai::{VoiceModel, analysis_prompt, enforce_post_limit, parse_voice_profile, remix_prompt};
use crate::domain::value_objects::voice::VoiceProfile;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicModel {
    http_client: reqwest::Client,
    api_key: String,
}

impl AnthropicModel {
    pub fn new(api_key: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let response = self
            .http_client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&serde_json::json!({
                "model": MODEL,
                "max_tokens": MAX_TOKENS,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await
            .context("anthropic: messages request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "anthropic: messages returned status {}",
                response.status()
            ));
        }

        #[derive(Deserialize)]
        struct MessagesResponse {
            content: Vec<ContentBlock>,
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(default)]
            text: String,
        }

        let parsed = response.json::<MessagesResponse>().await?;
        let text = parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| anyhow!("anthropic: reply has no content blocks"))?;

        Ok(text)
    }
}

#[async_trait]
impl VoiceModel for AnthropicModel {
    async fn analyze_voice(&self, posts: Vec<String>) -> Result<VoiceProfile> {
        let reply = self.complete(analysis_prompt(&posts)).await?;
        parse_voice_profile(&reply)
    }

    async fn remix(&self, source_text: String, profile: VoiceProfile) -> Result<String> {
        let reply = self.complete(remix_prompt(&source_text, &profile)).await?;
        Ok(enforce_post_limit(reply.trim().to_string()))
    }
}
