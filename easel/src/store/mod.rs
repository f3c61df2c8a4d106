//! Storage abstraction for the generation pipeline.
//!
//! The pipeline only needs a narrow slice of the database surface, captured
//! here as traits so the service can run against Postgres in production and
//! an in-memory store in tests.

use crate::db::{
    errors::Result,
    models::{
        generations::{GenerationCreateDBRequest, GenerationDBResponse, GenerationOutput},
        provider_configs::ProviderConfigDBResponse,
        users::UserDBResponse,
    },
};
use crate::types::{GenerationId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PgStore;

/// Point balances and account lookup.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Debit `amount` points iff the balance covers it. Returns whether the
    /// debit happened. Implementations must make the check-and-subtract
    /// atomic with respect to concurrent debits.
    async fn debit_if_sufficient(&self, id: UserId, amount: i64) -> Result<bool>;

    /// Credit `amount` points and return the new balance.
    async fn credit(&self, id: UserId, amount: i64) -> Result<i64>;
}

/// Generation record lifecycle and history.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Insert one `processing` record per request, all-or-nothing.
    async fn insert_batch(
        &self,
        requests: &[GenerationCreateDBRequest],
    ) -> Result<Vec<GenerationDBResponse>>;

    async fn mark_completed(
        &self,
        id: GenerationId,
        output: &GenerationOutput,
        completed_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn mark_failed(&self, id: GenerationId, error_message: &str) -> Result<()>;

    async fn set_points_used(&self, id: GenerationId, points: i64) -> Result<()>;

    /// Newest-first page of an account's records plus the total count.
    async fn list(
        &self,
        user_id: UserId,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<GenerationDBResponse>, i64)>;

    /// Delete the given records if owned by `user_id`; returns rows removed.
    async fn delete_owned(&self, user_id: UserId, ids: &[GenerationId]) -> Result<u64>;

    /// Delete all of an account's records; returns rows removed.
    async fn clear_owned(&self, user_id: UserId) -> Result<u64>;
}

/// Read access to the active provider configuration.
#[async_trait]
pub trait ProviderConfigStore: Send + Sync {
    async fn active_config(&self) -> Result<Option<ProviderConfigDBResponse>>;
}
