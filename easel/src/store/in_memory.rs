//! In-memory store used by the generation pipeline tests.
//!
//! Mirrors the Postgres semantics that matter to the pipeline: the debit is
//! a check-and-subtract under one lock, and batch inserts are atomic.

use super::{AccountStore, GenerationStore, ProviderConfigStore};
use crate::db::{
    errors::{DbError, Result},
    models::{
        generations::{
            GenerationCreateDBRequest, GenerationDBResponse, GenerationOutput, GenerationStatus,
        },
        provider_configs::ProviderConfigDBResponse,
        users::UserDBResponse,
    },
};
use crate::types::{GenerationId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    accounts: RwLock<HashMap<UserId, UserDBResponse>>,
    generations: RwLock<Vec<GenerationDBResponse>>,
    active_config: RwLock<Option<ProviderConfigDBResponse>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with the given balance and return its id.
    pub fn seed_account(&self, points: i64) -> UserId {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.accounts.write().insert(
            id,
            UserDBResponse {
                id,
                username: format!("user-{}", &id.to_string()[..8]),
                email: format!("{id}@test.invalid"),
                points,
                is_admin: false,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    /// Install an active provider configuration.
    pub fn set_active_config(&self, config: ProviderConfigDBResponse) {
        *self.active_config.write() = Some(config);
    }

    pub fn balance(&self, id: UserId) -> Option<i64> {
        self.accounts.read().get(&id).map(|a| a.points)
    }

    pub fn record(&self, id: GenerationId) -> Option<GenerationDBResponse> {
        self.generations.read().iter().find(|g| g.id == id).cloned()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get_account(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.accounts.read().get(&id).cloned())
    }

    async fn debit_if_sufficient(&self, id: UserId, amount: i64) -> Result<bool> {
        let mut accounts = self.accounts.write();
        match accounts.get_mut(&id) {
            Some(account) if account.points >= amount => {
                account.points -= amount;
                account.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn credit(&self, id: UserId, amount: i64) -> Result<i64> {
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(&id).ok_or(DbError::NotFound)?;
        account.points += amount;
        account.updated_at = Utc::now();
        Ok(account.points)
    }
}

#[async_trait]
impl GenerationStore for InMemoryStore {
    async fn insert_batch(
        &self,
        requests: &[GenerationCreateDBRequest],
    ) -> Result<Vec<GenerationDBResponse>> {
        let now = Utc::now();
        let records: Vec<GenerationDBResponse> = requests
            .iter()
            .map(|request| GenerationDBResponse {
                id: Uuid::new_v4(),
                user_id: request.user_id,
                prompt: request.prompt.clone(),
                optimized_prompt: request.optimized_prompt.clone(),
                model: request.model.clone(),
                status: GenerationStatus::Processing,
                image_url: None,
                image_b64: None,
                error_message: None,
                points_used: 0,
                created_at: now,
                completed_at: None,
            })
            .collect();
        self.generations.write().extend(records.iter().cloned());
        Ok(records)
    }

    async fn mark_completed(
        &self,
        id: GenerationId,
        output: &GenerationOutput,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut generations = self.generations.write();
        let record = generations
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(DbError::NotFound)?;
        record.status = GenerationStatus::Completed;
        match output {
            GenerationOutput::Url(url) => record.image_url = Some(url.clone()),
            GenerationOutput::Inline(b64) => record.image_b64 = Some(b64.clone()),
        }
        record.completed_at = Some(completed_at);
        Ok(())
    }

    async fn mark_failed(&self, id: GenerationId, error_message: &str) -> Result<()> {
        let mut generations = self.generations.write();
        let record = generations
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(DbError::NotFound)?;
        record.status = GenerationStatus::Failed;
        record.error_message = Some(error_message.to_string());
        record.points_used = 0;
        Ok(())
    }

    async fn set_points_used(&self, id: GenerationId, points: i64) -> Result<()> {
        let mut generations = self.generations.write();
        let record = generations
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(DbError::NotFound)?;
        record.points_used = points;
        Ok(())
    }

    async fn list(
        &self,
        user_id: UserId,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<GenerationDBResponse>, i64)> {
        let generations = self.generations.read();
        let mut owned: Vec<GenerationDBResponse> = generations
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = owned.len() as i64;
        let page = owned
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn delete_owned(&self, user_id: UserId, ids: &[GenerationId]) -> Result<u64> {
        let mut generations = self.generations.write();
        let before = generations.len();
        generations.retain(|g| !(g.user_id == user_id && ids.contains(&g.id)));
        Ok((before - generations.len()) as u64)
    }

    async fn clear_owned(&self, user_id: UserId) -> Result<u64> {
        let mut generations = self.generations.write();
        let before = generations.len();
        generations.retain(|g| g.user_id != user_id);
        Ok((before - generations.len()) as u64)
    }
}

#[async_trait]
impl ProviderConfigStore for InMemoryStore {
    async fn active_config(&self) -> Result<Option<ProviderConfigDBResponse>> {
        Ok(self.active_config.read().clone())
    }
}
