use serde::{Deserialize, Serialize};

/// Writing-style fingerprint extracted from a user's recent timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VoiceProfile {
    #[serde(default)]
    pub niche: Vec<String>,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub best_content: Vec<String>,
}

impl VoiceProfile {
    pub fn primary_niche(&self) -> Option<&str> {
        self.niche.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemixRequestModel {
    pub source_text: String,
    pub source_post_id: Option<String>,
    pub source_author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemixedPostDto {
    pub post_id: uuid::Uuid,
    pub content: String,
    pub backend_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPostDto {
    pub id: uuid::Uuid,
    pub content: String,
    pub source_author: Option<String>,
    pub backend_used: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl DraftPostDto {
    pub fn from_entity(entity: &crate::domain::entities::posts::PostEntity) -> Self {
        Self {
            id: entity.id,
            content: entity.content.clone(),
            source_author: entity.source_author.clone(),
            backend_used: entity.backend_used.clone(),
            created_at: entity.created_at,
        }
    }
}
