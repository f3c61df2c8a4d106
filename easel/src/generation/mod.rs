//! Generation orchestrator: optimize, fan out, settle.
//!
//! One `submit` call runs the whole pipeline synchronously from the caller's
//! point of view: an optional prompt-optimization call, one concurrent image
//! call per requested model, then a single ledger settlement over the batch.
//! Per-model failures never abort sibling calls; the optimizer failing never
//! aborts anything.

use crate::config::GenerationConfig;
use crate::db::models::{
    generations::{GenerationCreateDBRequest, GenerationDBResponse, GenerationOutput, GenerationStatus},
    provider_configs::ProviderConfigDBResponse,
};
use crate::errors::{Error, Result};
use crate::ledger::Ledger;
use crate::store::{AccountStore, GenerationStore, ProviderConfigStore};
use crate::types::{GenerationId, UserId};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;

pub mod extract;
pub mod provider;

use self::extract::extract_image;
use self::provider::{ChatRequest, ImageRequest, ProviderClient, ProviderEndpoint, ProviderError};

/// One inbound generation request, immutable once accepted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub enable_optimization: bool,
    /// Target models, in caller order. Must be non-empty.
    pub models: Vec<String>,
    pub size: Option<String>,
    pub output_format: Option<String>,
    /// Base64-encoded source image; switches provider calls to edit mode.
    pub source_image_b64: Option<String>,
    /// Overrides the active configuration's optimizer model.
    pub optimizer_model: Option<String>,
    /// Overrides the active configuration's system prompt.
    pub system_prompt: Option<String>,
}

pub struct GenerationService<S, P> {
    store: Arc<S>,
    provider: Arc<P>,
    ledger: Ledger<S>,
    config: GenerationConfig,
}

impl<S, P> GenerationService<S, P>
where
    S: AccountStore + GenerationStore + ProviderConfigStore,
    P: ProviderClient,
{
    pub fn new(store: Arc<S>, provider: Arc<P>, config: GenerationConfig) -> Self {
        let ledger = Ledger::new(store.clone());
        Self {
            store,
            provider,
            ledger,
            config,
        }
    }

    pub fn ledger(&self) -> &Ledger<S> {
        &self.ledger
    }

    /// Run one batch end to end and return every record, completed and
    /// failed intermixed. Resolves only after settlement.
    #[tracing::instrument(skip_all, fields(user_id = %crate::types::abbrev_uuid(&user_id)))]
    pub async fn submit(
        &self,
        user_id: UserId,
        request: GenerationRequest,
    ) -> Result<Vec<GenerationDBResponse>> {
        if request.models.is_empty() {
            return Err(Error::BadRequest {
                message: "At least one model must be requested".to_string(),
            });
        }
        if request.prompt.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Prompt must not be empty".to_string(),
            });
        }

        // Preconditions, before any external call or record insert
        let account = self
            .store
            .get_account(user_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "User".to_string(),
                id: user_id.to_string(),
            })?;
        if account.points < 1 {
            return Err(Error::InsufficientBalance);
        }
        let config = self
            .store
            .active_config()
            .await?
            .ok_or(Error::ConfigurationMissing)?;
        let endpoint = ProviderEndpoint {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        };

        let optimized_prompt = if request.enable_optimization {
            self.optimize_prompt(&endpoint, &config, &request).await
        } else {
            None
        };
        let effective_prompt = optimized_prompt
            .clone()
            .unwrap_or_else(|| request.prompt.clone());

        // All records exist as `processing` before the first provider call
        let create_requests: Vec<GenerationCreateDBRequest> = request
            .models
            .iter()
            .map(|model| GenerationCreateDBRequest {
                user_id,
                prompt: request.prompt.clone(),
                optimized_prompt: optimized_prompt.clone(),
                model: model.clone(),
            })
            .collect();
        let mut records = self.store.insert_batch(&create_requests).await?;

        let outcomes = join_all(records.iter_mut().map(|record| {
            self.run_model_call(&endpoint, record, &effective_prompt, &request)
        }))
        .await;

        // A store failure mid-batch aborts settlement; remaining processing
        // records are failed so nothing is left dangling.
        if let Some(err) = outcomes.into_iter().find_map(|o| o.err()) {
            self.abort_batch(&mut records, &err).await;
            return Err(err);
        }

        self.settle(user_id, &request, &mut records).await?;
        Ok(records)
    }

    /// Run the optimizer when the request and configuration resolve to a
    /// usable model and system prompt. Every failure path falls back to the
    /// original prompt; an unchanged result counts as no optimization.
    async fn optimize_prompt(
        &self,
        endpoint: &ProviderEndpoint,
        config: &ProviderConfigDBResponse,
        request: &GenerationRequest,
    ) -> Option<String> {
        let model = request
            .optimizer_model
            .clone()
            .or_else(|| config.optimizer_model.clone())?;
        let system_prompt = request
            .system_prompt
            .clone()
            .or_else(|| config.system_prompt.clone())?;

        let chat = ChatRequest {
            model,
            system_prompt: Some(system_prompt),
            user_prompt: request.prompt.clone(),
            max_tokens: self.config.optimizer_max_tokens,
            temperature: self.config.optimizer_temperature,
            timeout: self.config.optimizer_timeout,
        };

        match self.provider.complete_text(endpoint, &chat).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() || text == request.prompt {
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Err(err) => {
                tracing::warn!("Prompt optimization failed, using original prompt: {err}");
                None
            }
        }
    }

    /// One per-model provider call plus its record update. Returns Err only
    /// for store failures; provider failures become a failed record.
    async fn run_model_call(
        &self,
        endpoint: &ProviderEndpoint,
        record: &mut GenerationDBResponse,
        prompt: &str,
        request: &GenerationRequest,
    ) -> Result<()> {
        let image_request = ImageRequest {
            model: record.model.clone(),
            prompt: prompt.to_string(),
            size: request.size.clone(),
            output_format: request.output_format.clone(),
            source_image_b64: request.source_image_b64.clone(),
            timeout: self.config.image_timeout,
        };

        let outcome = match self.provider.generate_image(endpoint, &image_request).await {
            Ok(body) => match extract_image(&body) {
                Some(output) => Ok(output),
                None => Err("Provider response contained no image".to_string()),
            },
            Err(err) => Err(failure_message(&err)),
        };

        match outcome {
            Ok(output) => {
                let completed_at = Utc::now();
                self.store
                    .mark_completed(record.id, &output, completed_at)
                    .await?;
                record.status = GenerationStatus::Completed;
                match output {
                    GenerationOutput::Url(url) => record.image_url = Some(url),
                    GenerationOutput::Inline(b64) => record.image_b64 = Some(b64),
                }
                record.completed_at = Some(completed_at);
            }
            Err(message) => {
                tracing::info!(model = %record.model, "Generation failed: {message}");
                self.store.mark_failed(record.id, &message).await?;
                record.status = GenerationStatus::Failed;
                record.error_message = Some(message);
                record.points_used = 0;
            }
        }
        Ok(())
    }

    /// The single settlement step: a flat batch charge of 1 point, plus 1
    /// when optimization was requested, debited once iff at least one record
    /// completed. Completed records carry the full charge; failed records
    /// stay at zero.
    async fn settle(
        &self,
        user_id: UserId,
        request: &GenerationRequest,
        records: &mut [GenerationDBResponse],
    ) -> Result<()> {
        let success_count = records
            .iter()
            .filter(|r| r.status == GenerationStatus::Completed)
            .count();
        if success_count == 0 {
            return Ok(());
        }

        let charge = 1 + i64::from(request.enable_optimization);
        // The conditional debit can lose a race with another submission
        // draining the balance; the batch then settles uncharged rather
        // than sending the balance negative.
        if !self.ledger.try_debit(user_id, charge).await? {
            tracing::warn!("Balance drained before settlement, batch not charged");
            return Ok(());
        }

        for record in records
            .iter_mut()
            .filter(|r| r.status == GenerationStatus::Completed)
        {
            self.store.set_points_used(record.id, charge).await?;
            record.points_used = charge;
        }
        Ok(())
    }

    async fn abort_batch(&self, records: &mut [GenerationDBResponse], err: &Error) {
        let message = format!("Generation aborted: {err}");
        for record in records
            .iter_mut()
            .filter(|r| r.status == GenerationStatus::Processing)
        {
            if let Err(update_err) = self.store.mark_failed(record.id, &message).await {
                tracing::error!("Failed to mark aborted record failed: {update_err:#}");
            }
            record.status = GenerationStatus::Failed;
            record.error_message = Some(message.clone());
        }
    }

    /// Newest-first page of an account's records plus the total count.
    pub async fn history(
        &self,
        user_id: UserId,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<GenerationDBResponse>, i64)> {
        Ok(self.store.list(user_id, skip, limit).await?)
    }

    /// Delete specific records owned by the account; reports rows removed.
    pub async fn delete_records(&self, user_id: UserId, ids: &[GenerationId]) -> Result<u64> {
        Ok(self.store.delete_owned(user_id, ids).await?)
    }

    /// Delete all of an account's records; reports rows removed.
    pub async fn clear_records(&self, user_id: UserId) -> Result<u64> {
        Ok(self.store.clear_owned(user_id).await?)
    }
}

/// Prefer a provider-supplied message over our own phrasing when the error
/// body looks like the OpenAI `{"error": {"message": ...}}` shape.
fn failure_message(err: &ProviderError) -> String {
    if let ProviderError::Status { body, .. } = err {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            if let Some(message) = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(serde_json::Value::as_str)
                .filter(|m| !m.is_empty())
            {
                return message.to_string();
            }
        }
    }
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use super::provider::MockProviderClient;
    use serde_json::json;
    use std::time::Duration;

    fn active_config(optimizer: bool) -> ProviderConfigDBResponse {
        let now = Utc::now();
        ProviderConfigDBResponse {
            id: uuid::Uuid::new_v4(),
            config_key: "default".to_string(),
            base_url: "https://provider.test".to_string(),
            api_key: "sk-test".to_string(),
            optimizer_model: optimizer.then(|| "optimizer-1".to_string()),
            system_prompt: optimizer.then(|| "Rewrite the prompt vividly.".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(models: &[&str], optimize: bool) -> GenerationRequest {
        GenerationRequest {
            prompt: "a lighthouse at dusk".to_string(),
            enable_optimization: optimize,
            models: models.iter().map(|m| m.to_string()).collect(),
            size: None,
            output_format: None,
            source_image_b64: None,
            optimizer_model: None,
            system_prompt: None,
        }
    }

    fn url_payload(n: u32) -> serde_json::Value {
        json!({"data": [{"url": format!("https://img.test/{n}.png")}]})
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        provider: Arc<MockProviderClient>,
        service: GenerationService<InMemoryStore, MockProviderClient>,
    }

    fn fixture(optimizer_configured: bool) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store.set_active_config(active_config(optimizer_configured));
        let provider = Arc::new(MockProviderClient::new());
        let service = GenerationService::new(
            store.clone(),
            provider.clone(),
            GenerationConfig::default(),
        );
        Fixture {
            store,
            provider,
            service,
        }
    }

    #[tokio::test]
    async fn both_models_succeed_flat_charge_of_one() {
        let f = fixture(false);
        let user = f.store.seed_account(1);
        f.provider.queue_image("m1", Ok(url_payload(1)));
        f.provider.queue_image("m2", Ok(url_payload(2)));

        let records = f
            .service
            .submit(user, request(&["m1", "m2"], false))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.status, GenerationStatus::Completed);
            assert_eq!(record.points_used, 1);
            assert!(record.image_url.is_some());
            assert!(record.image_b64.is_none());
            assert!(record.completed_at.is_some());
        }
        assert_eq!(f.store.balance(user), Some(0));
    }

    #[tokio::test]
    async fn zero_balance_is_rejected_before_any_call() {
        let f = fixture(false);
        let user = f.store.seed_account(0);

        let err = f
            .service
            .submit(user, request(&["m1"], false))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InsufficientBalance));
        assert!(f.provider.image_calls().is_empty());
        let (records, total) = f.store.list(user, 0, 10).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn missing_active_config_fails_closed() {
        let store = Arc::new(InMemoryStore::new());
        let user = store.seed_account(5);
        let provider = Arc::new(MockProviderClient::new());
        let service =
            GenerationService::new(store, provider.clone(), GenerationConfig::default());

        let err = service.submit(user, request(&["m1"], false)).await.unwrap_err();

        assert!(matches!(err, Error::ConfigurationMissing));
        assert!(provider.image_calls().is_empty());
    }

    #[tokio::test]
    async fn all_failures_mean_no_charge() {
        let f = fixture(true);
        let user = f.store.seed_account(5);
        f.provider.queue_text(Ok("a luminous lighthouse at dusk".to_string()));
        f.provider.queue_image(
            "m1",
            Err(ProviderError::Status {
                status: 500,
                body: "upstream exploded".to_string(),
            }),
        );

        let records = f
            .service
            .submit(user, request(&["m1"], true))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, GenerationStatus::Failed);
        assert_eq!(records[0].points_used, 0);
        assert!(records[0].error_message.is_some());
        assert_eq!(f.store.balance(user), Some(5));
    }

    #[tokio::test]
    async fn partial_success_still_charges_the_full_batch_rate() {
        let f = fixture(true);
        let user = f.store.seed_account(5);
        f.provider.queue_text(Ok("a luminous lighthouse at dusk".to_string()));
        f.provider.queue_image("m1", Ok(url_payload(1)));
        f.provider.queue_image(
            "m2",
            Err(ProviderError::Status {
                status: 429,
                body: json!({"error": {"message": "rate limited"}}).to_string(),
            }),
        );

        let records = f
            .service
            .submit(user, request(&["m1", "m2"], true))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        let m1 = records.iter().find(|r| r.model == "m1").unwrap();
        let m2 = records.iter().find(|r| r.model == "m2").unwrap();
        assert_eq!(m1.status, GenerationStatus::Completed);
        assert_eq!(m1.points_used, 2);
        assert_eq!(m2.status, GenerationStatus::Failed);
        assert_eq!(m2.points_used, 0);
        assert_eq!(m2.error_message.as_deref(), Some("rate limited"));
        assert_eq!(f.store.balance(user), Some(3));
    }

    #[tokio::test]
    async fn charge_is_independent_of_model_count() {
        let f = fixture(false);
        let user = f.store.seed_account(10);
        for model in ["m1", "m2", "m3"] {
            f.provider.queue_image(model, Ok(url_payload(1)));
        }

        let records = f
            .service
            .submit(user, request(&["m1", "m2", "m3"], false))
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.points_used == 1));
        // One debit of one point, not one per model
        assert_eq!(f.store.balance(user), Some(9));
    }

    #[tokio::test]
    async fn optimizer_failure_falls_back_to_the_original_prompt() {
        let f = fixture(true);
        let user = f.store.seed_account(5);
        f.provider
            .queue_text(Err(ProviderError::Timeout(Duration::from_secs(30))));
        f.provider.queue_image("m1", Ok(url_payload(1)));
        f.provider.queue_image("m2", Ok(url_payload(2)));

        let records = f
            .service
            .submit(user, request(&["m1", "m2"], true))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.optimized_prompt.is_none()));
        assert!(records.iter().all(|r| r.status == GenerationStatus::Completed));
        let calls = f.provider.image_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.prompt == "a lighthouse at dusk"));
        // Optimization was still requested, so the charge is 2
        assert_eq!(f.store.balance(user), Some(3));
    }

    #[tokio::test]
    async fn unchanged_optimizer_output_is_not_recorded() {
        let f = fixture(true);
        let user = f.store.seed_account(5);
        f.provider.queue_text(Ok("a lighthouse at dusk".to_string()));
        f.provider.queue_image("m1", Ok(url_payload(1)));

        let records = f
            .service
            .submit(user, request(&["m1"], true))
            .await
            .unwrap();

        assert!(records[0].optimized_prompt.is_none());
    }

    #[tokio::test]
    async fn optimized_prompt_is_stored_and_used_downstream() {
        let f = fixture(true);
        let user = f.store.seed_account(5);
        f.provider
            .queue_text(Ok("a luminous lighthouse at violet dusk".to_string()));
        f.provider.queue_image("m1", Ok(url_payload(1)));

        let records = f
            .service
            .submit(user, request(&["m1"], true))
            .await
            .unwrap();

        assert_eq!(
            records[0].optimized_prompt.as_deref(),
            Some("a luminous lighthouse at violet dusk")
        );
        let calls = f.provider.image_calls();
        assert_eq!(calls[0].prompt, "a luminous lighthouse at violet dusk");
        let text_calls = f.provider.text_calls();
        assert_eq!(text_calls.len(), 1);
        assert_eq!(text_calls[0].max_tokens, 500);
    }

    #[tokio::test]
    async fn optimization_is_skipped_without_a_resolved_system_prompt() {
        // Config carries no optimizer defaults and the request supplies none
        let f = fixture(false);
        let user = f.store.seed_account(5);
        f.provider.queue_image("m1", Ok(url_payload(1)));

        let records = f
            .service
            .submit(user, request(&["m1"], true))
            .await
            .unwrap();

        assert!(f.provider.text_calls().is_empty());
        assert!(records[0].optimized_prompt.is_none());
        // Requested optimization still counts toward the charge
        assert_eq!(f.store.balance(user), Some(3));
    }

    #[tokio::test]
    async fn request_overrides_beat_config_defaults() {
        let f = fixture(true);
        let user = f.store.seed_account(5);
        f.provider.queue_text(Ok("rewritten".to_string()));
        f.provider.queue_image("m1", Ok(url_payload(1)));

        let mut req = request(&["m1"], true);
        req.optimizer_model = Some("custom-optimizer".to_string());
        req.system_prompt = Some("Be terse.".to_string());
        f.service.submit(user, req).await.unwrap();

        let calls = f.provider.text_calls();
        assert_eq!(calls[0].model, "custom-optimizer");
        assert_eq!(calls[0].system_prompt.as_deref(), Some("Be terse."));
    }

    #[tokio::test]
    async fn empty_model_list_is_rejected() {
        let f = fixture(false);
        let user = f.store.seed_account(5);

        let err = f.service.submit(user, request(&[], false)).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }

    #[tokio::test]
    async fn unextractable_payload_fails_the_record() {
        let f = fixture(false);
        let user = f.store.seed_account(5);
        f.provider
            .queue_image("m1", Ok(json!({"data": [{"revised_prompt": "x"}]})));

        let records = f
            .service
            .submit(user, request(&["m1"], false))
            .await
            .unwrap();

        assert_eq!(records[0].status, GenerationStatus::Failed);
        assert_eq!(
            records[0].error_message.as_deref(),
            Some("Provider response contained no image")
        );
        assert_eq!(f.store.balance(user), Some(5));
    }

    #[tokio::test]
    async fn inline_payloads_populate_only_the_inline_field() {
        let f = fixture(false);
        let user = f.store.seed_account(5);
        f.provider
            .queue_image("m1", Ok(json!({"data": [{"b64_json": "aW1hZ2U="}]})));

        let records = f
            .service
            .submit(user, request(&["m1"], false))
            .await
            .unwrap();

        assert_eq!(records[0].image_b64.as_deref(), Some("aW1hZ2U="));
        assert!(records[0].image_url.is_none());
    }

    #[tokio::test]
    async fn source_image_is_forwarded_to_every_model_call() {
        let f = fixture(false);
        let user = f.store.seed_account(5);
        f.provider.queue_image("m1", Ok(url_payload(1)));
        f.provider.queue_image("m2", Ok(url_payload(2)));

        let mut req = request(&["m1", "m2"], false);
        req.source_image_b64 = Some("c291cmNl".to_string());
        f.service.submit(user, req).await.unwrap();

        let calls = f.provider.image_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls
            .iter()
            .all(|c| c.source_image_b64.as_deref() == Some("c291cmNl")));
    }

    #[test_log::test(tokio::test)]
    async fn concurrent_submissions_never_overdraw() {
        let f = fixture(false);
        let store = f.store.clone();
        let provider = f.provider.clone();
        let user = store.seed_account(3);
        let service = Arc::new(GenerationService::new(
            store.clone(),
            provider.clone(),
            GenerationConfig::default(),
        ));

        for _ in 0..10 {
            provider.queue_image("m1", Ok(url_payload(1)));
        }

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.submit(user, request(&["m1"], false)).await })
            })
            .collect();
        for handle in handles {
            // Losers fail the precondition or settle uncharged; neither may
            // push the balance negative.
            let _ = handle.await.unwrap();
        }

        let balance = store.balance(user).unwrap();
        assert!((0..=3).contains(&balance), "balance went to {balance}");
    }

    #[tokio::test]
    async fn history_is_newest_first_and_paginated() {
        let f = fixture(false);
        let user = f.store.seed_account(10);
        for n in 0..3 {
            f.provider.queue_image("m1", Ok(url_payload(n)));
            f.service
                .submit(user, request(&["m1"], false))
                .await
                .unwrap();
        }

        let (page, total) = f.service.history(user, 0, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert!(page[0].created_at >= page[1].created_at);

        let (rest, _) = f.service.history(user, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[tokio::test]
    async fn delete_and_clear_are_owner_scoped() {
        let f = fixture(false);
        let owner = f.store.seed_account(10);
        let other = f.store.seed_account(10);
        f.provider.queue_image("m1", Ok(url_payload(1)));
        f.provider.queue_image("m1", Ok(url_payload(2)));
        let owned = f.service.submit(owner, request(&["m1"], false)).await.unwrap();
        let theirs = f.service.submit(other, request(&["m1"], false)).await.unwrap();

        // Deleting someone else's record removes nothing
        let removed = f
            .service
            .delete_records(owner, &[theirs[0].id])
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = f
            .service
            .delete_records(owner, &[owned[0].id])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let removed = f.service.clear_records(other).await.unwrap();
        assert_eq!(removed, 1);
        let (records, total) = f.service.history(other, 0, 10).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(total, 0);
    }

    /// Wraps the in-memory store and fails `mark_completed` for one model's
    /// record, standing in for a database dropping out mid-batch.
    struct FlakyStore {
        inner: InMemoryStore,
        fail_completions_for: String,
    }

    #[async_trait::async_trait]
    impl crate::store::AccountStore for FlakyStore {
        async fn get_account(
            &self,
            id: UserId,
        ) -> crate::db::errors::Result<Option<crate::db::models::users::UserDBResponse>> {
            self.inner.get_account(id).await
        }

        async fn debit_if_sufficient(
            &self,
            id: UserId,
            amount: i64,
        ) -> crate::db::errors::Result<bool> {
            self.inner.debit_if_sufficient(id, amount).await
        }

        async fn credit(&self, id: UserId, amount: i64) -> crate::db::errors::Result<i64> {
            self.inner.credit(id, amount).await
        }
    }

    #[async_trait::async_trait]
    impl crate::store::GenerationStore for FlakyStore {
        async fn insert_batch(
            &self,
            requests: &[GenerationCreateDBRequest],
        ) -> crate::db::errors::Result<Vec<GenerationDBResponse>> {
            self.inner.insert_batch(requests).await
        }

        async fn mark_completed(
            &self,
            id: GenerationId,
            output: &GenerationOutput,
            completed_at: chrono::DateTime<Utc>,
        ) -> crate::db::errors::Result<()> {
            let model = self.inner.record(id).map(|r| r.model);
            if model.as_deref() == Some(self.fail_completions_for.as_str()) {
                return Err(crate::db::errors::DbError::Other(anyhow::anyhow!(
                    "connection reset"
                )));
            }
            self.inner.mark_completed(id, output, completed_at).await
        }

        async fn mark_failed(
            &self,
            id: GenerationId,
            error_message: &str,
        ) -> crate::db::errors::Result<()> {
            self.inner.mark_failed(id, error_message).await
        }

        async fn set_points_used(
            &self,
            id: GenerationId,
            points: i64,
        ) -> crate::db::errors::Result<()> {
            self.inner.set_points_used(id, points).await
        }

        async fn list(
            &self,
            user_id: UserId,
            skip: i64,
            limit: i64,
        ) -> crate::db::errors::Result<(Vec<GenerationDBResponse>, i64)> {
            self.inner.list(user_id, skip, limit).await
        }

        async fn delete_owned(
            &self,
            user_id: UserId,
            ids: &[GenerationId],
        ) -> crate::db::errors::Result<u64> {
            self.inner.delete_owned(user_id, ids).await
        }

        async fn clear_owned(&self, user_id: UserId) -> crate::db::errors::Result<u64> {
            self.inner.clear_owned(user_id).await
        }
    }

    #[async_trait::async_trait]
    impl crate::store::ProviderConfigStore for FlakyStore {
        async fn active_config(
            &self,
        ) -> crate::db::errors::Result<Option<ProviderConfigDBResponse>> {
            self.inner.active_config().await
        }
    }

    #[tokio::test]
    async fn store_failure_mid_batch_aborts_without_charge() {
        let inner = InMemoryStore::new();
        let user = inner.seed_account(5);
        inner.set_active_config(active_config(false));
        let store = Arc::new(FlakyStore {
            inner,
            fail_completions_for: "m1".to_string(),
        });
        let provider = Arc::new(MockProviderClient::new());
        provider.queue_image("m1", Ok(url_payload(1)));
        provider.queue_image("m2", Ok(url_payload(2)));
        let service =
            GenerationService::new(store.clone(), provider, GenerationConfig::default());

        let err = service
            .submit(user, request(&["m1", "m2"], false))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        let (records, _) = store.inner.list(user, 0, 10).await.unwrap();
        let m1 = records.iter().find(|r| r.model == "m1").unwrap();
        let m2 = records.iter().find(|r| r.model == "m2").unwrap();

        // The record whose update failed ends up failed with the abort
        // message, its sibling keeps its completed outcome, and no
        // settlement ran.
        assert_eq!(m1.status, GenerationStatus::Failed);
        assert_eq!(
            m1.error_message.as_deref(),
            Some("Generation aborted: connection reset")
        );
        assert_eq!(m2.status, GenerationStatus::Completed);
        assert_eq!(m2.points_used, 0);
        assert_eq!(store.inner.balance(user), Some(5));
    }
}
