use crate::db::{
    errors::{DbError, Result},
    models::users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

// Database entity model for an account row
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub points: i64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserDBResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            points: row.points,
            is_admin: row.is_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, username, email, points, is_admin, created_at, updated_at";

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new account
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, email, points, is_admin)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&request.username)
        .bind(&request.email)
        .bind(request.points)
        .bind(request.is_admin)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row.into())
    }

    /// Fetch an account by id
    pub async fn get(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Fetch an account by username
    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row.map(Into::into))
    }

    /// List accounts with pagination, newest first
    pub async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<UserDBResponse>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             ORDER BY created_at DESC, id DESC
             OFFSET $1 LIMIT $2"
        ))
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Count all accounts
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Atomically debit an account's points, but only if the balance covers it.
    ///
    /// The conditional UPDATE is the serialization point for concurrent debits:
    /// two submissions racing on the same account can never both pass a balance
    /// check that was only momentarily true. Returns `false` when the balance
    /// was insufficient (no mutation performed).
    pub async fn debit_if_sufficient(&mut self, id: UserId, amount: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users
             SET points = points - $2, updated_at = NOW()
             WHERE id = $1 AND points >= $2",
        )
        .bind(id)
        .bind(amount)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Atomically credit an account's points.
    pub async fn credit(&mut self, id: UserId, amount: i64) -> Result<i64> {
        let balance: Option<i64> = sqlx::query_scalar(
            "UPDATE users
             SET points = points + $2, updated_at = NOW()
             WHERE id = $1
             RETURNING points",
        )
        .bind(id)
        .bind(amount)
        .fetch_optional(&mut *self.db)
        .await?;

        balance.ok_or(DbError::NotFound)
    }
}
