use crate::{
    AppState,
    api::models::{
        pagination::{PaginatedResponse, Pagination},
        users::{BalanceResponse, PointsGrant, UserCreate, UserResponse},
    },
    db::{handlers::Users, models::users::UserCreateDBRequest},
    errors::{Error, Result},
    types::UserId,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// Create an account
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    summary = "Create an account",
    description = "Create a new account, seeded with the configured initial point balance",
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 409, description = "Username or email already taken"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(data): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    if data.username.trim().is_empty() || data.email.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Username and email must not be empty".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: data.username,
            email: data.email,
            points: state.config.points.initial_points_for_new_users,
            is_admin: false,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Get an account
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Get an account",
    params(
        ("user_id" = String, Path, description = "Account ID (UUID)"),
    ),
    responses(
        (status = 200, description = "The account", body = UserResponse),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get(user_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: user_id.to_string(),
        })?;

    Ok(Json(user.into()))
}

/// List accounts
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List accounts",
    params(Pagination),
    responses(
        (status = 200, description = "Page of accounts", body = PaginatedResponse<UserResponse>),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let (skip, limit) = pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let users = repo.list(skip, limit).await?;
    let total = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total,
        skip,
        limit,
    )))
}

/// Get an account's point balance
#[utoipa::path(
    get,
    path = "/users/{user_id}/points",
    tag = "points",
    summary = "Get point balance",
    params(
        ("user_id" = String, Path, description = "Account ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<BalanceResponse>> {
    let points = state.generations.ledger().balance(user_id).await?;
    Ok(Json(BalanceResponse { user_id, points }))
}

/// Grant points to an account
#[utoipa::path(
    post,
    path = "/users/{user_id}/points",
    tag = "points",
    summary = "Grant points",
    description = "Administrative credit of points to an account",
    params(
        ("user_id" = String, Path, description = "Account ID (UUID)"),
    ),
    responses(
        (status = 200, description = "New balance after the grant", body = BalanceResponse),
        (status = 400, description = "Non-positive amount"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn grant_points(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(data): Json<PointsGrant>,
) -> Result<Json<BalanceResponse>> {
    if data.points <= 0 {
        return Err(Error::BadRequest {
            message: "Points must be greater than zero".to_string(),
        });
    }

    let points = state.generations.ledger().credit(user_id, data.points).await?;
    Ok(Json(BalanceResponse { user_id, points }))
}
