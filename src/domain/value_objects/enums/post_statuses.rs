use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PostStatus {
    #[default]
    Draft,
    Scheduled,
}

impl Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
        };
        write!(f, "{}", status)
    }
}
