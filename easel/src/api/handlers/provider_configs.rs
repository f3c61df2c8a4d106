use crate::{
    AppState,
    api::models::provider_configs::{
        ProviderConfigCreate, ProviderConfigResponse, ProviderConfigUpdate,
    },
    db::handlers::ProviderConfigs,
    errors::{Error, Result},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

/// Create a provider configuration
#[utoipa::path(
    post,
    path = "/admin/provider-configs",
    tag = "provider-configs",
    summary = "Create a provider configuration",
    responses(
        (status = 201, description = "Configuration created", body = ProviderConfigResponse),
        (status = 409, description = "Configuration key already exists"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_provider_config(
    State(state): State<AppState>,
    Json(data): Json<ProviderConfigCreate>,
) -> Result<(StatusCode, Json<ProviderConfigResponse>)> {
    if data.config_key.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Configuration key must not be empty".to_string(),
        });
    }

    // Creating an active configuration deactivates the rest; both steps in
    // one transaction so the single-active invariant holds.
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let config = ProviderConfigs::new(&mut tx).create(&data.into()).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(config.into())))
}

/// List provider configurations
#[utoipa::path(
    get,
    path = "/admin/provider-configs",
    tag = "provider-configs",
    summary = "List provider configurations",
    responses(
        (status = 200, description = "All configurations", body = [ProviderConfigResponse]),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn list_provider_configs(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderConfigResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let configs = ProviderConfigs::new(&mut conn).list().await?;

    Ok(Json(configs.into_iter().map(ProviderConfigResponse::from).collect()))
}

/// Get a provider configuration
#[utoipa::path(
    get,
    path = "/admin/provider-configs/{config_key}",
    tag = "provider-configs",
    summary = "Get a provider configuration",
    params(
        ("config_key" = String, Path, description = "Configuration key"),
    ),
    responses(
        (status = 200, description = "The configuration", body = ProviderConfigResponse),
        (status = 404, description = "Configuration not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn get_provider_config(
    State(state): State<AppState>,
    Path(config_key): Path<String>,
) -> Result<Json<ProviderConfigResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let config = ProviderConfigs::new(&mut conn)
        .get_by_key(&config_key)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "ProviderConfig".to_string(),
            id: config_key,
        })?;

    Ok(Json(config.into()))
}

/// Update a provider configuration
#[utoipa::path(
    put,
    path = "/admin/provider-configs/{config_key}",
    tag = "provider-configs",
    summary = "Update a provider configuration",
    description = "Omitted fields are left unchanged",
    params(
        ("config_key" = String, Path, description = "Configuration key"),
    ),
    responses(
        (status = 200, description = "Updated configuration", body = ProviderConfigResponse),
        (status = 404, description = "Configuration not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn update_provider_config(
    State(state): State<AppState>,
    Path(config_key): Path<String>,
    Json(data): Json<ProviderConfigUpdate>,
) -> Result<Json<ProviderConfigResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let config = ProviderConfigs::new(&mut conn)
        .update(&config_key, &data.into())
        .await?;

    Ok(Json(config.into()))
}

/// Activate a provider configuration
#[utoipa::path(
    post,
    path = "/admin/provider-configs/{config_key}/activate",
    tag = "provider-configs",
    summary = "Activate a provider configuration",
    description = "Makes this configuration the active one; any other active configuration is deactivated",
    params(
        ("config_key" = String, Path, description = "Configuration key"),
    ),
    responses(
        (status = 200, description = "Activated configuration", body = ProviderConfigResponse),
        (status = 404, description = "Configuration not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn activate_provider_config(
    State(state): State<AppState>,
    Path(config_key): Path<String>,
) -> Result<Json<ProviderConfigResponse>> {
    // Deactivate-then-activate must be atomic so the single-active invariant
    // holds even if the second step fails.
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let config = ProviderConfigs::new(&mut tx).activate(&config_key).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(config.into()))
}

/// Delete a provider configuration
#[utoipa::path(
    delete,
    path = "/admin/provider-configs/{config_key}",
    tag = "provider-configs",
    summary = "Delete a provider configuration",
    params(
        ("config_key" = String, Path, description = "Configuration key"),
    ),
    responses(
        (status = 204, description = "Configuration deleted"),
        (status = 404, description = "Configuration not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn delete_provider_config(
    State(state): State<AppState>,
    Path(config_key): Path<String>,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    ProviderConfigs::new(&mut conn).delete(&config_key).await?;

    Ok(StatusCode::NO_CONTENT)
}
