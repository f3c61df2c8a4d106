use crate::db::{
    errors::{DbError, Result},
    models::provider_configs::{
        ProviderConfigCreateDBRequest, ProviderConfigDBResponse, ProviderConfigUpdateDBRequest,
    },
};
use crate::types::ProviderConfigId;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

// Database entity model for a provider configuration row
#[derive(Debug, Clone, FromRow)]
struct ProviderConfigRow {
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

impl From<ProviderConfigRow> for ProviderConfigDBResponse {
    fn from(row: ProviderConfigRow) -> Self {
        Self {
            id: row.id,
            config_key: row.config_key,
            base_url: row.base_url,
            api_key: row.api_key,
            optimizer_model: row.optimizer_model,
            system_prompt: row.system_prompt,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const CONFIG_COLUMNS: &str = "id, config_key, base_url, api_key, optimizer_model, \
     system_prompt, is_active, created_at, updated_at";

pub struct ProviderConfigs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ProviderConfigs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new provider configuration.
    ///
    /// When `is_active` is requested, any previously active configuration is
    /// deactivated first so the single-active invariant holds.
    pub async fn create(
        &mut self,
        request: &ProviderConfigCreateDBRequest,
    ) -> Result<ProviderConfigDBResponse> {
        if request.is_active {
            self.deactivate_all().await?;
        }

        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "INSERT INTO provider_configs
                 (config_key, base_url, api_key, optimizer_model, system_prompt, is_active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {CONFIG_COLUMNS}"
        ))
        .bind(&request.config_key)
        .bind(&request.base_url)
        .bind(&request.api_key)
        .bind(&request.optimizer_model)
        .bind(&request.system_prompt)
        .bind(request.is_active)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row.into())
    }

    /// Fetch a configuration by its key
    pub async fn get_by_key(&mut self, config_key: &str) -> Result<Option<ProviderConfigDBResponse>> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM provider_configs WHERE config_key = $1"
        ))
        .bind(config_key)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Fetch the single active configuration, if any
    pub async fn get_active(&mut self) -> Result<Option<ProviderConfigDBResponse>> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM provider_configs WHERE is_active LIMIT 1"
        ))
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List all configurations, newest first
    pub async fn list(&mut self) -> Result<Vec<ProviderConfigDBResponse>> {
        let rows = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "SELECT {CONFIG_COLUMNS} FROM provider_configs ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Update a configuration; unset fields are left unchanged
    pub async fn update(
        &mut self,
        config_key: &str,
        request: &ProviderConfigUpdateDBRequest,
    ) -> Result<ProviderConfigDBResponse> {
        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "UPDATE provider_configs
             SET base_url = COALESCE($2, base_url),
                 api_key = COALESCE($3, api_key),
                 optimizer_model = COALESCE($4, optimizer_model),
                 system_prompt = COALESCE($5, system_prompt),
                 updated_at = NOW()
             WHERE config_key = $1
             RETURNING {CONFIG_COLUMNS}"
        ))
        .bind(config_key)
        .bind(&request.base_url)
        .bind(&request.api_key)
        .bind(&request.optimizer_model)
        .bind(&request.system_prompt)
        .fetch_optional(&mut *self.db)
        .await?;

        row.map(Into::into).ok_or(DbError::NotFound)
    }

    /// Make one configuration the active one, deactivating the rest
    pub async fn activate(&mut self, config_key: &str) -> Result<ProviderConfigDBResponse> {
        self.deactivate_all().await?;

        let row = sqlx::query_as::<_, ProviderConfigRow>(&format!(
            "UPDATE provider_configs
             SET is_active = TRUE, updated_at = NOW()
             WHERE config_key = $1
             RETURNING {CONFIG_COLUMNS}"
        ))
        .bind(config_key)
        .fetch_optional(&mut *self.db)
        .await?;

        row.map(Into::into).ok_or(DbError::NotFound)
    }

    /// Delete a configuration by key
    pub async fn delete(&mut self, config_key: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM provider_configs WHERE config_key = $1")
            .bind(config_key)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn deactivate_all(&mut self) -> Result<()> {
        sqlx::query("UPDATE provider_configs SET is_active = FALSE, updated_at = NOW() WHERE is_active")
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }
}
