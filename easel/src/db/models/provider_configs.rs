//! Database models for provider configurations.

use crate::types::ProviderConfigId;
use chrono::{DateTime, Utc};

/// Database request for creating a provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfigCreateDBRequest {
    pub config_key: String,
    pub base_url: String,
    pub api_key: String,
    pub optimizer_model: Option<String>,
    pub system_prompt: Option<String>,
    pub is_active: bool,
}

/// Database request for updating a provider configuration.
/// `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfigUpdateDBRequest {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub optimizer_model: Option<String>,
    pub system_prompt: Option<String>,
}

/// Database response for a provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfigDBResponse {
    pub id: ProviderConfigId,
    pub config_key: String,
    pub base_url: String,
    pub api_key: String,
    pub optimizer_model: Option<String>,
    pub system_prompt: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
