use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScheduledPostStatus {
    #[default]
    Pending,
    Posted,
    Failed,
}

impl Display for ScheduledPostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            ScheduledPostStatus::Pending => "pending",
            ScheduledPostStatus::Posted => "posted",
            ScheduledPostStatus::Failed => "failed",
        };
        write!(f, "{}", status)
    }
}

impl ScheduledPostStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "posted" => ScheduledPostStatus::Posted,
            "failed" => ScheduledPostStatus::Failed,
            _ => ScheduledPostStatus::Pending,
        }
    }
}
