use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlanType {
    #[default]
    Free,
    Pro,
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plan = match self {
            PlanType::Free => "free",
            PlanType::Pro => "pro",
        };
        write!(f, "{}", plan)
    }
}

impl PlanType {
    pub fn from_str(value: &str) -> Self {
        match value {
            "pro" => PlanType::Pro,
            _ => PlanType::Free,
        }
    }
}
