//! API models for generation submission and history.

use crate::db::models::generations::{GenerationDBResponse, GenerationStatus};
use crate::generation::GenerationRequest;
use crate::types::{GenerationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for submitting a generation batch
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerationCreate {
    /// The prompt to render
    pub prompt: String,
    /// Target models, called independently; one record is returned per model
    pub models: Vec<String>,
    /// Rewrite the prompt through the optimizer before generating
    #[serde(default)]
    pub enable_optimization: bool,
    /// Requested output dimensions, e.g. "1024x1024"
    #[serde(default)]
    pub size: Option<String>,
    /// Requested image file format, e.g. "png"
    #[serde(default)]
    pub output_format: Option<String>,
    /// Base64-encoded source image; switches generation to edit mode
    #[serde(default)]
    pub source_image_b64: Option<String>,
    /// Overrides the configured optimizer model
    #[serde(default)]
    pub optimizer_model: Option<String>,
    /// Overrides the configured optimizer system prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl From<GenerationCreate> for GenerationRequest {
    fn from(body: GenerationCreate) -> Self {
        Self {
            prompt: body.prompt,
            enable_optimization: body.enable_optimization,
            models: body.models,
            size: body.size,
            output_format: body.output_format,
            source_image_b64: body.source_image_b64,
            optimizer_model: body.optimizer_model,
            system_prompt: body.system_prompt,
        }
    }
}

/// A generation record as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerationResponse {
    #[schema(value_type = uuid::Uuid)]
    pub id: GenerationId,
    #[schema(value_type = uuid::Uuid)]
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

impl From<GenerationDBResponse> for GenerationResponse {
    fn from(record: GenerationDBResponse) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            prompt: record.prompt,
            optimized_prompt: record.optimized_prompt,
            model: record.model,
            status: record.status,
            image_url: record.image_url,
            image_b64: record.image_b64,
            error_message: record.error_message,
            points_used: record.points_used,
            created_at: record.created_at,
            completed_at: record.completed_at,
        }
    }
}

/// Request body for deleting specific records
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerationDeleteRequest {
    #[schema(value_type = Vec<uuid::Uuid>)]
    pub ids: Vec<GenerationId>,
}

/// Result of a delete or clear operation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerationDeleteResponse {
    /// How many records were removed
    pub removed_count: u64,
}
