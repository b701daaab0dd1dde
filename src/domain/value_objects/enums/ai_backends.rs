use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Which generative-text backend remixes for this user.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AiBackend {
    #[default]
    Claude,
    Mistral,
    Grok,
}

impl Display for AiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self {
            AiBackend::Claude => "claude",
            AiBackend::Mistral => "mistral",
            AiBackend::Grok => "grok",
        };
        write!(f, "{}", backend)
    }
}

impl AiBackend {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "claude" => Some(AiBackend::Claude),
            "mistral" => Some(AiBackend::Mistral),
            "grok" => Some(AiBackend::Grok),
            _ => None,
        }
    }
}
