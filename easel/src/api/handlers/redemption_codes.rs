use crate::{
    AppState,
    api::models::{
        pagination::Pagination,
        redemption_codes::{
            RedeemRequest, RedeemResponse, RedemptionCodeCreate, RedemptionCodeResponse,
        },
    },
    db::{
        errors::DbError,
        handlers::RedemptionCodes,
        models::redemption_codes::RedemptionCodeCreateDBRequest,
    },
    errors::{Error, Result},
    types::UserId,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use rand::Rng;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 12;

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Create a redemption code
#[utoipa::path(
    post,
    path = "/admin/redemption-codes",
    tag = "redemption-codes",
    summary = "Create a redemption code",
    description = "Generates a unique 12-character code worth the given number of points",
    responses(
        (status = 201, description = "Code created", body = RedemptionCodeResponse),
        (status = 400, description = "Non-positive point value"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn create_redemption_code(
    State(state): State<AppState>,
    Json(data): Json<RedemptionCodeCreate>,
) -> Result<(StatusCode, Json<RedemptionCodeResponse>)> {
    if data.points <= 0 {
        return Err(Error::BadRequest {
            message: "Points must be greater than zero".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = RedemptionCodes::new(&mut conn);

    // The code column is unique; on the rare collision, draw again
    for _ in 0..5 {
        let request = RedemptionCodeCreateDBRequest {
            code: random_code(),
            points: data.points,
            created_by: None,
            expires_at: data.expires_at,
        };
        match repo.create(&request).await {
            Ok(code) => return Ok((StatusCode::CREATED, Json(code.into()))),
            Err(DbError::UniqueViolation { .. }) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(Error::Internal {
        operation: "generate a unique redemption code".to_string(),
    })
}

/// List redemption codes
#[utoipa::path(
    get,
    path = "/admin/redemption-codes",
    tag = "redemption-codes",
    summary = "List redemption codes",
    params(Pagination),
    responses(
        (status = 200, description = "Page of codes", body = [RedemptionCodeResponse]),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn list_redemption_codes(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<RedemptionCodeResponse>>> {
    let (skip, limit) = pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let codes = RedemptionCodes::new(&mut conn).list(skip, limit).await?;

    Ok(Json(codes.into_iter().map(RedemptionCodeResponse::from).collect()))
}

/// Redeem a code
#[utoipa::path(
    post,
    path = "/users/{user_id}/redemptions",
    tag = "redemption-codes",
    summary = "Redeem a code",
    description = "Claims the code for the account and credits its points. \
                   A code can only ever be redeemed once.",
    params(
        ("user_id" = String, Path, description = "Account ID (UUID)"),
    ),
    responses(
        (status = 200, description = "Points credited", body = RedeemResponse),
        (status = 400, description = "Invalid, used, or expired code"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn redeem_code(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(data): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>> {
    let code = data.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(Error::BadRequest {
            message: "A code must be provided".to_string(),
        });
    }

    // Claim and credit in one transaction: if the credit fails (e.g. the
    // account is gone) the claim rolls back and the code stays redeemable.
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let claimed = match RedemptionCodes::new(&mut tx).claim(&code, user_id).await {
        Ok(claimed) => claimed,
        Err(DbError::NotFound) => {
            return Err(Error::BadRequest {
                message: "Invalid, already used, or expired code".to_string(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    let new_balance = crate::db::handlers::Users::new(&mut tx)
        .credit(user_id, claimed.points)
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(RedeemResponse {
        points_granted: claimed.points,
        new_balance,
    }))
}
