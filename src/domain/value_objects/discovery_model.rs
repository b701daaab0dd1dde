use serde::{Deserialize, Serialize};

/// A high-engagement post surfaced from recent search, remix candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViralPostDto {
    pub post_id: String,
    pub author_username: String,
    pub text: String,
    pub like_count: u64,
    pub retweet_count: u64,
    pub reply_count: u64,
}

impl ViralPostDto {
    pub fn engagement(&self) -> u64 {
        self.like_count + self.retweet_count + self.reply_count
    }
}
