//! API models for provider configuration management.
//!
//! Responses never echo the stored credential back; only a short suffix is
//! exposed so an administrator can tell keys apart.

use crate::db::models::provider_configs::{
    ProviderConfigCreateDBRequest, ProviderConfigDBResponse, ProviderConfigUpdateDBRequest,
};
use crate::types::ProviderConfigId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for creating a provider configuration
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProviderConfigCreate {
    pub config_key: String,
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub optimizer_model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Activate this configuration immediately, deactivating any other
    #[serde(default)]
    pub is_active: bool,
}

impl From<ProviderConfigCreate> for ProviderConfigCreateDBRequest {
    fn from(body: ProviderConfigCreate) -> Self {
        Self {
            config_key: body.config_key,
            base_url: body.base_url,
            api_key: body.api_key,
            optimizer_model: body.optimizer_model,
            system_prompt: body.system_prompt,
            is_active: body.is_active,
        }
    }
}

/// Request body for updating a provider configuration.
/// Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProviderConfigUpdate {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub optimizer_model: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl From<ProviderConfigUpdate> for ProviderConfigUpdateDBRequest {
    fn from(body: ProviderConfigUpdate) -> Self {
        Self {
            base_url: body.base_url,
            api_key: body.api_key,
            optimizer_model: body.optimizer_model,
            system_prompt: body.system_prompt,
        }
    }
}

/// A provider configuration as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProviderConfigResponse {
    #[schema(value_type = uuid::Uuid)]
    pub id: ProviderConfigId,
    pub config_key: String,
    pub base_url: String,
    /// Last four characters of the stored credential
    pub api_key_suffix: String,
    pub optimizer_model: Option<String>,
    pub system_prompt: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProviderConfigDBResponse> for ProviderConfigResponse {
    fn from(config: ProviderConfigDBResponse) -> Self {
        let api_key_suffix = config
            .api_key
            .char_indices()
            .rev()
            .nth(3)
            .map(|(i, _)| &config.api_key[i..])
            .unwrap_or(&config.api_key)
            .to_string();
        Self {
            id: config.id,
            config_key: config.config_key,
            base_url: config.base_url,
            api_key_suffix,
            optimizer_model: config.optimizer_model,
            system_prompt: config.system_prompt,
            is_active: config.is_active,
            created_at: config.created_at,
            updated_at: config.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responses_only_expose_a_key_suffix() {
        let now = Utc::now();
        let response = ProviderConfigResponse::from(ProviderConfigDBResponse {
            id: uuid::Uuid::new_v4(),
            config_key: "default".to_string(),
            base_url: "https://provider.test".to_string(),
            api_key: "sk-secret-abcd".to_string(),
            optimizer_model: None,
            system_prompt: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        });
        assert_eq!(response.api_key_suffix, "abcd");
    }
}
