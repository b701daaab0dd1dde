use anyhow::{Context, Result, anyhow};
use axum::async_trait;
use serde::Deserialize;

use crate::ai::{VoiceModel, analysis_prompt, enforce_post_limit, parse_voice_profile, remix_prompt};
use crate::domain::value_objects::voice::VoiceProfile;

const CHAT_URL: &str = "https://api.mistral.ai/v1/chat/completions";
const MODEL: &str = "mistral-small-latest";

pub struct MistralModel {
    http_client: reqwest::Client,
    api_key: String,
}

impl MistralModel {
    pub fn new(api_key: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String> {
        let response = self
            .http_client
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": MODEL,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await
            .context("mistral: chat request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "mistral: chat returned status {}",
                response.status()
            ));
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
            .ok_or_else(|| anyhow!("mistral: reply has no choices"))?;

        Ok(text)
    }
}

#[async_trait]
impl VoiceModel for MistralModel {
    async fn analyze_voice(&self, posts: Vec<String>) -> Result<VoiceProfile> {
        let reply = self.complete(analysis_prompt(&posts)).await?;
        parse_voice_profile(&reply)
    }

    async fn remix(&self, source_text: String, profile: VoiceProfile) -> Result<String> {
        let reply = self.complete(remix_prompt(&source_text, &profile)).await?;
        Ok(enforce_post_limit(reply.trim().to_string()))
    }
}
