use crate::db::{
    errors::{DbError, Result},
    models::redemption_codes::{RedemptionCodeCreateDBRequest, RedemptionCodeDBResponse},
};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

// Database entity model for a redemption code row
#[derive(Debug, Clone, FromRow)]
struct RedemptionCodeRow {
    pub id: uuid::Uuid,
    pub code: String,
    pub points: i64,
    pub is_used: bool,
    pub used_by: Option<UserId>,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl From<RedemptionCodeRow> for RedemptionCodeDBResponse {
    fn from(row: RedemptionCodeRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            points: row.points,
            is_used: row.is_used,
            used_by: row.used_by,
            used_at: row.used_at,
            expires_at: row.expires_at,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

const CODE_COLUMNS: &str =
    "id, code, points, is_used, used_by, used_at, expires_at, created_by, created_at";

pub struct RedemptionCodes<'c> {
    db: &'c mut PgConnection,
}

impl<'c> RedemptionCodes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new redemption code
    pub async fn create(
        &mut self,
        request: &RedemptionCodeCreateDBRequest,
    ) -> Result<RedemptionCodeDBResponse> {
        let row = sqlx::query_as::<_, RedemptionCodeRow>(&format!(
            "INSERT INTO redemption_codes (code, points, created_by, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {CODE_COLUMNS}"
        ))
        .bind(&request.code)
        .bind(request.points)
        .bind(request.created_by)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row.into())
    }

    /// Fetch a code by its string value
    pub async fn get_by_code(&mut self, code: &str) -> Result<Option<RedemptionCodeDBResponse>> {
        let row = sqlx::query_as::<_, RedemptionCodeRow>(&format!(
            "SELECT {CODE_COLUMNS} FROM redemption_codes WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List codes newest-first
    pub async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<RedemptionCodeDBResponse>> {
        let rows = sqlx::query_as::<_, RedemptionCodeRow>(&format!(
            "SELECT {CODE_COLUMNS} FROM redemption_codes
             ORDER BY created_at DESC, id DESC
             OFFSET $1 LIMIT $2"
        ))
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Atomically claim an unused, unexpired code for a user.
    ///
    /// The conditional UPDATE prevents double redemption under concurrency:
    /// only one caller can flip `is_used`. Returns the claimed code or
    /// NotFound when the code is missing, already used, or expired.
    pub async fn claim(&mut self, code: &str, user_id: UserId) -> Result<RedemptionCodeDBResponse> {
        let row = sqlx::query_as::<_, RedemptionCodeRow>(&format!(
            "UPDATE redemption_codes
             SET is_used = TRUE, used_by = $2, used_at = NOW()
             WHERE code = $1
               AND NOT is_used
               AND (expires_at IS NULL OR expires_at > NOW())
             RETURNING {CODE_COLUMNS}"
        ))
        .bind(code)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        row.map(Into::into).ok_or(DbError::NotFound)
    }
}
