//! API models for redemption codes.

use crate::db::models::redemption_codes::RedemptionCodeDBResponse;
use crate::types::{RedemptionCodeId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for creating a redemption code
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RedemptionCodeCreate {
    /// Points granted when the code is redeemed; must be positive
    pub points: i64,
    /// Optional expiry; codes without one never expire
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A redemption code as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RedemptionCodeResponse {
    #[schema(value_type = uuid::Uuid)]
    pub id: RedemptionCodeId,
    pub code: String,
    pub points: i64,
    pub is_used: bool,
    #[schema(value_type = Option<uuid::Uuid>)]
    pub used_by: Option<UserId>,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<RedemptionCodeDBResponse> for RedemptionCodeResponse {
    fn from(code: RedemptionCodeDBResponse) -> Self {
        Self {
            id: code.id,
            code: code.code,
            points: code.points,
            is_used: code.is_used,
            used_by: code.used_by,
            used_at: code.used_at,
            expires_at: code.expires_at,
            created_at: code.created_at,
        }
    }
}

/// Request body for redeeming a code
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RedeemRequest {
    pub code: String,
}

/// Result of a successful redemption
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RedeemResponse {
    pub points_granted: i64,
    pub new_balance: i64,
}
