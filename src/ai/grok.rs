use anyhow::{Context, Result, anyhow};
use axum::async_trait;
use serde::Deserialize;

use crate::ai::{VoiceModel, analysis_prompt, enforce_post_limit, parse_voice_profile, remix_prompt};
use crate::domain::value_objects::voice::VoiceProfile;

const MODEL: &str = "grok-beta";

/// OpenAI-compatible chat client for xAI, base URL configurable for tests.
pub struct GrokModel {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GrokModel {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": MODEL,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await
            .context("grok: chat request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("grok: chat returned status {}", response.status()));
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }

        let parsed = response.json::<ChatResponse>().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("grok: reply has no choices"))?;

        Ok(text)
    }
}

#[async_trait]
impl VoiceModel for GrokModel {
    async fn analyze_voice(&self, posts: Vec<String>) -> Result<VoiceProfile> {
        let reply = self.complete(analysis_prompt(&posts)).await?;
        parse_voice_profile(&reply)
    }

    async fn remix(&self, source_text: String, profile: VoiceProfile) -> Result<String> {
        let reply = self.complete(remix_prompt(&source_text, &profile)).await?;
        Ok(enforce_post_limit(reply.trim().to_string()))
    }
}
