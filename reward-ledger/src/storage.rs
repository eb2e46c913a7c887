//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Account documents (key: account prefix)
//! - `transactions` - Transaction records (key: account prefix || seq)
//! - `referrals` - Referred users (key: account prefix || seq)
//!
//! The account prefix is the id's byte length (u32 BE) followed by its
//! bytes, so one account's keys never share a prefix with another's.
//! Sequence numbers are big-endian so a prefix scan yields insertion order.

use crate::{
    config::LedgerConfig,
    error::{Error, Result},
    store::AccountStore,
    types::{AccountId, AccountPatch, Referral, Transaction, UserAccount},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";
const CF_REFERRALS: &str = "referrals";

/// RocksDB-backed [`AccountStore`]
pub struct RocksStore {
    db: Arc<DB>,
    /// Serializes read-modify-write on account documents
    write_lock: Mutex<()>,
    /// Next sequence number per (column family, account prefix)
    sequences: Mutex<HashMap<(&'static str, Vec<u8>), u64>>,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore").finish_non_exhaustive()
    }
}

impl RocksStore {
    /// Open or create database
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_REFERRALS, Self::cf_options_log()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB account store");

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
            sequences: Mutex::new(HashMap::new()),
        })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Accounts are read on every operation, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers

    fn account_prefix(id: &AccountId) -> Vec<u8> {
        let bytes = id.as_str().as_bytes();
        let mut key = Vec::with_capacity(4 + bytes.len());
        key.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        key.extend_from_slice(bytes);
        key
    }

    fn sequenced_key(prefix: &[u8], seq: u64) -> Vec<u8> {
        let mut key = prefix.to_vec();
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    // Account documents

    fn read_account(&self, id: &AccountId) -> Result<Option<UserAccount>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        match self.db.get_cf(&cf, Self::account_prefix(id))? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn write_account(&self, id: &AccountId, account: &UserAccount) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let value = bincode::serialize(account)?;
        self.db.put_cf(&cf, Self::account_prefix(id), value)?;
        Ok(())
    }

    // Sequenced records

    fn scan_prefix<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let cf = self.cf_handle(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            records.push(bincode::deserialize(&value)?);
        }

        Ok(records)
    }

    fn count_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<u64> {
        let cf = self.cf_handle(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut count = 0u64;
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
        }

        Ok(count)
    }

    fn append_sequenced(&self, cf_name: &'static str, prefix: Vec<u8>, value: &[u8]) -> Result<u64> {
        let mut sequences = self.sequences.lock();
        let slot = (cf_name, prefix.clone());
        let seq = match sequences.get(&slot) {
            Some(next) => *next,
            None => self.count_prefix(cf_name, &prefix)?,
        };

        let cf = self.cf_handle(cf_name)?;
        self.db.put_cf(&cf, Self::sequenced_key(&prefix, seq), value)?;
        sequences.insert(slot, seq + 1);

        Ok(seq)
    }
}

#[async_trait]
impl AccountStore for RocksStore {
    async fn get_account(&self, id: &AccountId) -> Result<Option<UserAccount>> {
        self.read_account(id)
    }

    async fn put_account(&self, id: &AccountId, account: &UserAccount) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.write_account(id, account)?;

        tracing::debug!(account_id = %id, "Account document written");
        Ok(())
    }

    async fn update_account(&self, id: &AccountId, patch: &AccountPatch) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut account = self
            .read_account(id)?
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))?;
        patch.apply_to(&mut account);
        self.write_account(id, &account)?;

        tracing::debug!(account_id = %id, "Account document updated");
        Ok(())
    }

    async fn append_transaction(&self, id: &AccountId, tx: &Transaction) -> Result<()> {
        let value = bincode::serialize(tx)?;
        let seq = self.append_sequenced(CF_TRANSACTIONS, Self::account_prefix(id), &value)?;

        tracing::debug!(
            account_id = %id,
            tx_id = %tx.id,
            seq,
            "Transaction appended"
        );
        Ok(())
    }

    async fn transactions(&self, id: &AccountId) -> Result<Vec<Transaction>> {
        self.scan_prefix(CF_TRANSACTIONS, &Self::account_prefix(id))
    }

    async fn referrals(&self, id: &AccountId) -> Result<Vec<Referral>> {
        self.scan_prefix(CF_REFERRALS, &Self::account_prefix(id))
    }

    async fn put_referral(&self, id: &AccountId, referral: &Referral) -> Result<()> {
        let value = bincode::serialize(referral)?;
        self.append_sequenced(CF_REFERRALS, Self::account_prefix(id), &value)?;
        Ok(())
    }
}
