//! Database models for user accounts.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new account
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub points: i64,
    pub is_admin: bool,
}

/// Database response for an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub points: i64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
