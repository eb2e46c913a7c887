//! Account store abstraction
//!
//! The ledger talks to its persistence layer only through [`AccountStore`],
//! a narrow read/replace/update interface with per-document atomicity and
//! no cross-document transactions. Two implementations ship with the crate:
//!
//! - [`MemoryStore`]: process-local, used by tests and local-only mode
//! - [`crate::storage::RocksStore`]: RocksDB-backed, used in production

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::{
    error::{Error, Result},
    types::{AccountId, AccountPatch, Referral, Transaction, UserAccount},
};

/// Document store holding accounts, their transactions and referrals
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch an account document
    async fn get_account(&self, id: &AccountId) -> Result<Option<UserAccount>>;

    /// Replace (or create) an account document
    async fn put_account(&self, id: &AccountId, account: &UserAccount) -> Result<()>;

    /// Write only the fields set in `patch`; fails if the account is absent
    async fn update_account(&self, id: &AccountId, patch: &AccountPatch) -> Result<()>;

    /// Append a transaction record for `id`
    async fn append_transaction(&self, id: &AccountId, tx: &Transaction) -> Result<()>;

    /// Transactions of `id` in insertion order (oldest first)
    async fn transactions(&self, id: &AccountId) -> Result<Vec<Transaction>>;

    /// Users referred by `id`
    async fn referrals(&self, id: &AccountId) -> Result<Vec<Referral>>;

    /// Record a referred user for `id`
    async fn put_referral(&self, id: &AccountId, referral: &Referral) -> Result<()>;
}

/// In-memory store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    accounts: Arc<DashMap<AccountId, UserAccount>>,
    transactions: Arc<DashMap<AccountId, Vec<Transaction>>>,
    referrals: Arc<DashMap<AccountId, Vec<Referral>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account(&self, id: &AccountId) -> Result<Option<UserAccount>> {
        Ok(self.accounts.get(id).map(|entry| entry.value().clone()))
    }

    async fn put_account(&self, id: &AccountId, account: &UserAccount) -> Result<()> {
        self.accounts.insert(id.clone(), account.clone());
        Ok(())
    }

    async fn update_account(&self, id: &AccountId, patch: &AccountPatch) -> Result<()> {
        let mut entry = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))?;
        patch.apply_to(entry.value_mut());
        Ok(())
    }

    async fn append_transaction(&self, id: &AccountId, tx: &Transaction) -> Result<()> {
        self.transactions
            .entry(id.clone())
            .or_default()
            .push(tx.clone());
        Ok(())
    }

    async fn transactions(&self, id: &AccountId) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn referrals(&self, id: &AccountId) -> Result<Vec<Referral>> {
        Ok(self
            .referrals
            .get(id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn put_referral(&self, id: &AccountId, referral: &Referral) -> Result<()> {
        self.referrals
            .entry(id.clone())
            .or_default()
            .push(referral.clone());
        Ok(())
    }
}
