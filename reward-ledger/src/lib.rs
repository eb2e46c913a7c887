//! ESC Coin Reward Ledger
//!
//! Balance and counter bookkeeping for the earn-by-watching-ads product:
//! ad rewards, bonus credits, bonus-to-reward conversion and withdrawals.
//!
//! # Architecture
//!
//! - **Pure rules**: every balance transition is a function over `UserAccount`
//! - **Injected store**: `AccountStore` trait, in-memory or RocksDB
//! - **Single writer**: one actor task serializes operations in a process
//! - **Lazy reset**: daily counters are zeroed when an account is loaded
//!
//! # Invariants
//!
//! - Balances and counters are non-negative integers
//! - Rejected operations change nothing
//! - Milestone bonuses are paid once per crossing
//! - Withdrawals are recorded PENDING and never auto-complete

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    clippy::all
)]

pub mod actor;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod notify;
pub mod referral;
pub mod rules;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports
pub use actor::{spawn_ledger_actor, LedgerHandle};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{LedgerConfig, RewardRules, StoreBackend};
pub use error::{Error, Result};
pub use ledger::{Outcome, RewardLedger};
pub use notify::{ChannelSink, MemorySink, Notification, NotificationSink, TracingSink};
pub use rules::{AdClaim, Rejection};
pub use storage::RocksStore;
pub use store::{AccountStore, MemoryStore};
pub use types::{
    AccountId, AccountPatch, AuthIdentity, CoinCurrency, Referral, ReferralStatus, Transaction,
    TransactionKind, TransactionStatus, UserAccount, WalletAddress,
};
