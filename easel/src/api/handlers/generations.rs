use crate::{
    AppState,
    api::models::{
        generations::{
            GenerationCreate, GenerationDeleteRequest, GenerationDeleteResponse, GenerationResponse,
        },
        pagination::{PaginatedResponse, Pagination},
    },
    errors::{Error, Result},
    types::UserId,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// Submit a generation batch
#[utoipa::path(
    post,
    path = "/users/{user_id}/generations",
    tag = "generations",
    summary = "Submit a generation batch",
    description = "Run the prompt against every requested model and return one record per model. \
                   Responds only once every model call has resolved and the batch is settled.",
    params(
        ("user_id" = String, Path, description = "Account ID (UUID)"),
    ),
    responses(
        (status = 201, description = "One record per requested model", body = [GenerationResponse]),
        (status = 400, description = "Empty prompt or model list"),
        (status = 402, description = "Insufficient point balance"),
        (status = 404, description = "Account not found"),
        (status = 503, description = "No active provider configuration"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_generation(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(data): Json<GenerationCreate>,
) -> Result<(StatusCode, Json<Vec<GenerationResponse>>)> {
    let records = state.generations.submit(user_id, data.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(records.into_iter().map(GenerationResponse::from).collect()),
    ))
}

/// List an account's generation history
#[utoipa::path(
    get,
    path = "/users/{user_id}/generations",
    tag = "generations",
    summary = "List generation history",
    description = "Newest-first page of the account's generation records",
    params(
        ("user_id" = String, Path, description = "Account ID (UUID)"),
        Pagination,
    ),
    responses(
        (status = 200, description = "Page of records", body = PaginatedResponse<GenerationResponse>),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn list_generations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<GenerationResponse>>> {
    let (skip, limit) = pagination.params();
    let (records, total) = state.generations.history(user_id, skip, limit).await?;

    Ok(Json(PaginatedResponse::new(
        records.into_iter().map(GenerationResponse::from).collect(),
        total,
        skip,
        limit,
    )))
}

/// Delete specific generation records
#[utoipa::path(
    delete,
    path = "/users/{user_id}/generations",
    tag = "generations",
    summary = "Delete generation records",
    description = "Delete the given records; records owned by other accounts are ignored",
    params(
        ("user_id" = String, Path, description = "Account ID (UUID)"),
    ),
    responses(
        (status = 200, description = "How many records were removed", body = GenerationDeleteResponse),
        (status = 400, description = "Empty id list"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn delete_generations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(data): Json<GenerationDeleteRequest>,
) -> Result<Json<GenerationDeleteResponse>> {
    if data.ids.is_empty() {
        return Err(Error::BadRequest {
            message: "At least one record id must be given".to_string(),
        });
    }

    let removed_count = state.generations.delete_records(user_id, &data.ids).await?;
    Ok(Json(GenerationDeleteResponse { removed_count }))
}

/// Clear an account's generation history
#[utoipa::path(
    delete,
    path = "/users/{user_id}/generations/all",
    tag = "generations",
    summary = "Clear generation history",
    params(
        ("user_id" = String, Path, description = "Account ID (UUID)"),
    ),
    responses(
        (status = 200, description = "How many records were removed", body = GenerationDeleteResponse),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn clear_generations(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<GenerationDeleteResponse>> {
    let removed_count = state.generations.clear_records(user_id).await?;
    Ok(Json(GenerationDeleteResponse { removed_count }))
}
