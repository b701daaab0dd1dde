pub mod anthropic;
pub mod grok;
pub mod mistral;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::async_trait;
use mockall::automock;

use crate::config::config_model::Ai;
use crate::domain::value_objects::{enums::ai_backends::AiBackend, voice::VoiceProfile};
use crate::x_api::MAX_POST_CHARS;

#[async_trait]
#[automock]
pub trait VoiceModel {
    async fn analyze_voice(&self, posts: Vec<String>) -> Result<VoiceProfile>;
    async fn remix(&self, source_text: String, profile: VoiceProfile) -> Result<String>;
}

/// Maps a user's preferred backend to a concrete model client.
pub struct VoiceModelRegistry {
    models: HashMap<AiBackend, Arc<dyn VoiceModel + Send + Sync>>,
}

impl VoiceModelRegistry {
    pub fn from_config(config: &Ai) -> Self {
        let mut models: HashMap<AiBackend, Arc<dyn VoiceModel + Send + Sync>> = HashMap::new();
        models.insert(
            AiBackend::Claude,
            Arc::new(anthropic::AnthropicModel::new(
                config.anthropic_api_key.clone(),
            )),
        );
        models.insert(
            AiBackend::Mistral,
            Arc::new(mistral::MistralModel::new(config.mistral_api_key.clone())),
        );
        models.insert(
            AiBackend::Grok,
            Arc::new(grok::GrokModel::new(
                config.grok_api_key.clone(),
                config.grok_base_url.clone(),
            )),
        );

        Self { models }
    }

    #[cfg(test)]
    pub fn with_models(models: HashMap<AiBackend, Arc<dyn VoiceModel + Send + Sync>>) -> Self {
        Self { models }
    }

    /// Unknown or missing preferences fall back to the default backend.
    pub fn resolve(&self, preferred: &str) -> Arc<dyn VoiceModel + Send + Sync> {
        let backend = AiBackend::from_str(preferred).unwrap_or_default();
        let model = self
            .models
            .get(&backend)
            .or_else(|| self.models.get(&AiBackend::default()))
            .expect("default voice model is not registered");

        Arc::clone(model)
    }
}

pub fn analysis_prompt(posts: &[String]) -> String {
    let mut prompt = String::from(
        "Analyze the writing voice in these posts. Respond with only a JSON object \
         with keys: niche (array of strings, most specific first), tone (string), \
         topics (array of strings), best_content (array of up to 3 verbatim posts \
         that performed best stylistically).\n\nPosts:\n",
    );
    for post in posts {
        prompt.push_str("- ");
        prompt.push_str(post);
        prompt.push('\n');
    }
    prompt
}

pub fn remix_prompt(source_text: &str, profile: &VoiceProfile) -> String {
    format!(
        "Rewrite the following post in a different voice. Tone: {}. Topics the \
         author cares about: {}. Keep it under 280 characters, no hashtags unless \
         the source has them, no quotes around the output.\n\nSource post:\n{}",
        profile.tone,
        profile.topics.join(", "),
        source_text
    )
}

/// Pulls a JSON object out of a model reply, tolerating markdown code fences
/// around it.
pub fn extract_json_block(reply: &str) -> Option<String> {
    let trimmed = reply.trim();

    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else {
        trimmed
    };

    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    if end < start {
        return None;
    }

    Some(inner[start..=end].to_string())
}

pub fn parse_voice_profile(reply: &str) -> Result<VoiceProfile> {
    let block = extract_json_block(reply)
        .ok_or_else(|| anyhow::anyhow!("model reply contains no JSON object"))?;
    let profile = serde_json::from_str::<VoiceProfile>(&block)?;
    Ok(profile)
}

/// Hard cap on generated posts, truncating on a char boundary with an ellipsis.
pub fn enforce_post_limit(text: String) -> String {
    if text.chars().count() <= MAX_POST_CHARS {
        return text;
    }

    let truncated: String = text.chars().take(MAX_POST_CHARS - 3).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_json() {
        let reply = r#"{"niche":["fintech"],"tone":"dry"}"#;
        assert_eq!(extract_json_block(reply).unwrap(), reply);
    }

    #[test]
    fn extracts_fenced_json() {
        let reply = "```json\n{\"niche\":[\"fintech\"],\"tone\":\"dry\"}\n```";
        let block = extract_json_block(reply).unwrap();
        assert!(block.starts_with('{'));
        assert!(block.ends_with('}'));
        assert!(serde_json::from_str::<serde_json::Value>(&block).is_ok());
    }

    #[test]
    fn extracts_json_with_surrounding_prose() {
        let reply = "Here is the analysis:\n{\"tone\":\"upbeat\"}\nHope that helps!";
        assert_eq!(extract_json_block(reply).unwrap(), r#"{"tone":"upbeat"}"#);
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(extract_json_block("no json here").is_none());
    }

    #[test]
    fn parses_profile_with_missing_fields() {
        let profile = parse_voice_profile(r#"{"tone":"dry"}"#).unwrap();
        assert_eq!(profile.tone, "dry");
        assert!(profile.niche.is_empty());
    }

    #[test]
    fn short_posts_pass_through_unchanged() {
        let text = "short enough".to_string();
        assert_eq!(enforce_post_limit(text.clone()), text);
    }

    #[test]
    fn long_posts_are_truncated_with_ellipsis() {
        let text = "x".repeat(400);
        let capped = enforce_post_limit(text);

        assert_eq!(capped.chars().count(), MAX_POST_CHARS);
        assert!(capped.ends_with("..."));
    }

    #[test]
    fn registry_falls_back_to_default_backend() {
        let mut models: HashMap<AiBackend, Arc<dyn VoiceModel + Send + Sync>> = HashMap::new();
        models.insert(AiBackend::Claude, Arc::new(MockVoiceModel::new()));

        let registry = VoiceModelRegistry::with_models(models);

        // Unknown preference resolves instead of panicking.
        let _ = registry.resolve("not-a-backend");
        let _ = registry.resolve("claude");
    }
}
