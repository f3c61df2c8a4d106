//! Database models for generation records.

use crate::types::{GenerationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a generation record.
///
/// Records start as `Processing` and move exactly once to `Completed` or
/// `Failed`; terminal states are never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStatus::Processing => write!(f, "processing"),
            GenerationStatus::Completed => write!(f, "completed"),
            GenerationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(GenerationStatus::Processing),
            "completed" => Ok(GenerationStatus::Completed),
            "failed" => Ok(GenerationStatus::Failed),
            other => Err(format!("unknown generation status: {other}")),
        }
    }
}

/// Image output of a successful generation: exactly one of a remote URL or
/// inline base64-encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutput {
    Url(String),
    Inline(String),
}

/// Database request for creating a generation record
#[derive(Debug, Clone)]
pub struct GenerationCreateDBRequest {
    pub user_id: UserId,
    pub prompt: String,
    pub optimized_prompt: Option<String>,
    pub model: String,
}

/// Database response for a generation record
#[derive(Debug, Clone)]
pub struct GenerationDBResponse {
    pub id: GenerationId,
    pub user_id: UserId,
    pub prompt: String,
    pub optimized_prompt: Option<String>,
    pub model: String,
    pub status: GenerationStatus,
    pub image_url: Option<String>,
    pub image_b64: Option<String>,
    pub error_message: Option<String>,
    pub points_used: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<GenerationStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<GenerationStatus>().is_err());
    }
}
