//! API models for account management and the points ledger.

use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for creating an account
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
}

/// An account as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(value_type = uuid::Uuid)]
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub points: i64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            points: user.points,
            is_admin: user.is_admin,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Request body for an administrative points grant
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PointsGrant {
    /// Points to add; must be positive
    pub points: i64,
}

/// Current point balance for an account
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    #[schema(value_type = uuid::Uuid)]
    pub user_id: UserId,
    pub points: i64,
}
