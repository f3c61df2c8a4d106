//! Points ledger.
//!
//! All balance mutations go through here. The debit path relies on the
//! store's conditional update so a balance can never go negative, no matter
//! how many submissions race on the same account.

use crate::errors::{Error, Result};
use crate::store::AccountStore;
use crate::types::UserId;
use std::sync::Arc;

#[derive(Debug)]
pub struct Ledger<S> {
    store: Arc<S>,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: AccountStore> Ledger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Current balance for an account.
    pub async fn balance(&self, user_id: UserId) -> Result<i64> {
        let account = self
            .store
            .get_account(user_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                resource: "User".to_string(),
                id: user_id.to_string(),
            })?;
        Ok(account.points)
    }

    /// Debit `amount` points, failing with `InsufficientBalance` when the
    /// account cannot cover it. A zero debit is a no-op that still verifies
    /// the account exists.
    pub async fn debit(&self, user_id: UserId, amount: i64) -> Result<()> {
        if amount < 0 {
            return Err(Error::BadRequest {
                message: "Debit amount must not be negative".to_string(),
            });
        }
        if self.store.debit_if_sufficient(user_id, amount).await? {
            Ok(())
        } else {
            Err(Error::InsufficientBalance)
        }
    }

    /// Try to debit without treating an insufficient balance as an error.
    /// Returns whether the debit happened.
    pub async fn try_debit(&self, user_id: UserId, amount: i64) -> Result<bool> {
        if amount < 0 {
            return Err(Error::BadRequest {
                message: "Debit amount must not be negative".to_string(),
            });
        }
        Ok(self.store.debit_if_sufficient(user_id, amount).await?)
    }

    /// Credit `amount` points and return the new balance.
    pub async fn credit(&self, user_id: UserId, amount: i64) -> Result<i64> {
        if amount < 0 {
            return Err(Error::BadRequest {
                message: "Credit amount must not be negative".to_string(),
            });
        }
        Ok(self.store.credit(user_id, amount).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn debit_fails_without_coverage() {
        let store = Arc::new(InMemoryStore::new());
        let user = store.seed_account(1);
        let ledger = Ledger::new(store.clone());

        ledger.debit(user, 1).await.unwrap();
        let err = ledger.debit(user, 1).await.unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance));
        assert_eq!(store.balance(user), Some(0));
    }

    #[tokio::test]
    async fn rejects_negative_amounts() {
        let store = Arc::new(InMemoryStore::new());
        let user = store.seed_account(10);
        let ledger = Ledger::new(store);

        assert!(ledger.debit(user, -1).await.is_err());
        assert!(ledger.credit(user, -1).await.is_err());
    }

    #[tokio::test]
    async fn credit_returns_new_balance() {
        let store = Arc::new(InMemoryStore::new());
        let user = store.seed_account(3);
        let ledger = Ledger::new(store);

        assert_eq!(ledger.credit(user, 7).await.unwrap(), 10);
    }

    #[test_log::test(tokio::test)]
    async fn concurrent_debits_never_overdraw() {
        let store = Arc::new(InMemoryStore::new());
        let user = store.seed_account(5);
        let ledger = Ledger::new(store.clone());

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.try_debit(user, 1).await.unwrap() })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(store.balance(user), Some(0));
    }
}
