//! Postgres-backed store delegating to the repository layer.

use super::{AccountStore, GenerationStore, ProviderConfigStore};
use crate::db::{
    errors::Result,
    handlers::{Generations, ProviderConfigs, Users},
    models::{
        generations::{GenerationCreateDBRequest, GenerationDBResponse, GenerationOutput},
        provider_configs::ProviderConfigDBResponse,
        users::UserDBResponse,
    },
};
use crate::types::{GenerationId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get_account(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get(id).await
    }

    async fn debit_if_sufficient(&self, id: UserId, amount: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).debit_if_sufficient(id, amount).await
    }

    async fn credit(&self, id: UserId, amount: i64) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).credit(id, amount).await
    }
}

#[async_trait]
impl GenerationStore for PgStore {
    async fn insert_batch(
        &self,
        requests: &[GenerationCreateDBRequest],
    ) -> Result<Vec<GenerationDBResponse>> {
        // One transaction so a half-inserted batch never becomes visible
        let mut tx = self.pool.begin().await?;
        let mut records = Vec::with_capacity(requests.len());
        for request in requests {
            records.push(Generations::new(&mut tx).create(request).await?);
        }
        tx.commit().await?;
        Ok(records)
    }

    async fn mark_completed(
        &self,
        id: GenerationId,
        output: &GenerationOutput,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Generations::new(&mut conn)
            .mark_completed(id, output, completed_at)
            .await
    }

    async fn mark_failed(&self, id: GenerationId, error_message: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Generations::new(&mut conn).mark_failed(id, error_message).await
    }

    async fn set_points_used(&self, id: GenerationId, points: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Generations::new(&mut conn).set_points_used(id, points).await
    }

    async fn list(
        &self,
        user_id: UserId,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<GenerationDBResponse>, i64)> {
        let mut conn = self.pool.acquire().await?;
        let mut repo = Generations::new(&mut conn);
        let records = repo.list(user_id, skip, limit).await?;
        let total = repo.count(user_id).await?;
        Ok((records, total))
    }

    async fn delete_owned(&self, user_id: UserId, ids: &[GenerationId]) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        Generations::new(&mut conn).delete_owned(user_id, ids).await
    }

    async fn clear_owned(&self, user_id: UserId) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        Generations::new(&mut conn).clear_owned(user_id).await
    }
}

#[async_trait]
impl ProviderConfigStore for PgStore {
    async fn active_config(&self) -> Result<Option<ProviderConfigDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        ProviderConfigs::new(&mut conn).get_active().await
    }
}
