//! Main ledger orchestration layer
//!
//! This module ties together the store, the transition rules, the clock and
//! the notification sink into the high-level reward API.
//!
//! Every mutating operation is a read-modify-write:
//!
//! 1. load the account (applying the lazy daily reset)
//! 2. run the pure transition from [`crate::rules`]
//! 3. write the changed fields back with a partial update
//! 4. append the transaction record, if the operation produces one
//! 5. notify the user (best-effort)
//!
//! Steps 3 and 4 are separate writes; a failure between them leaves the
//! balance updated without its record.
//!
//! # Example
//!
//! ```no_run
//! use reward_ledger::{AccountId, AuthIdentity, LedgerConfig, RewardLedger};
//!
//! #[tokio::main]
//! async fn main() -> reward_ledger::Result<()> {
//!     let ledger = RewardLedger::open(&LedgerConfig::default())?;
//!
//!     let identity = AuthIdentity {
//!         id: AccountId::new("uid-123"),
//!         display_name: Some("alice".to_string()),
//!         email: None,
//!     };
//!     ledger.sign_in(&identity).await?;
//!
//!     let outcome = ledger.convert_coins(&identity.id, 500).await?;
//!     assert!(outcome.is_applied());
//!     Ok(())
//! }
//! ```

use crate::{
    clock::{Clock, SystemClock},
    config::{LedgerConfig, RewardRules, StoreBackend},
    metrics::Metrics,
    notify::{Notification, NotificationSink, TracingSink},
    rules::{self, AdClaim, Rejection},
    storage::RocksStore,
    store::{AccountStore, MemoryStore},
    types::{
        AccountId, AccountPatch, AuthIdentity, CoinCurrency, Referral, Transaction,
        TransactionKind, TransactionStatus, UserAccount, WalletAddress,
    },
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Result of a ledger operation that can be refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome<T> {
    /// Balance transition applied
    Applied(T),
    /// Preconditions not met, nothing changed
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    /// True if the transition was applied
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    /// Applied value, if any
    pub fn applied(&self) -> Option<&T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    /// Rejection, if any
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Rejected(rejection) => Some(rejection),
        }
    }

    /// Convert into a plain `Result`
    pub fn into_result(self) -> std::result::Result<T, Rejection> {
        match self {
            Outcome::Applied(value) => Ok(value),
            Outcome::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Reward ledger service
pub struct RewardLedger {
    /// Account documents and transaction log
    store: Arc<dyn AccountStore>,

    /// Notification delivery
    notifier: Arc<dyn NotificationSink>,

    /// Time source for the daily reset
    clock: Arc<dyn Clock>,

    /// Transition constants
    rules: RewardRules,

    /// Metrics
    metrics: Metrics,
}

impl std::fmt::Debug for RewardLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewardLedger")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl RewardLedger {
    /// Ledger over `store` with log notifications and the system clock
    ///
    /// Fails with [`Error::Config`] if `rules` do not validate.
    pub fn new(store: Arc<dyn AccountStore>, rules: RewardRules) -> Result<Self> {
        rules.validate()?;

        Ok(Self {
            store,
            notifier: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
            rules,
            metrics: Metrics::default(),
        })
    }

    /// Open ledger with configuration
    pub fn open(config: &LedgerConfig) -> Result<Self> {
        config.rules.validate()?;

        let store: Arc<dyn AccountStore> = match config.store {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::RocksDb => Arc::new(RocksStore::open(config)?),
        };

        tracing::info!(
            service = %config.service_name,
            store = ?config.store,
            "Reward ledger opened"
        );

        Self::new(store, config.rules.clone())
    }

    /// Set notification sink
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Set clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set metrics collector
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Transition constants in use
    pub fn rules(&self) -> &RewardRules {
        &self.rules
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Load or create the account for a signed-in identity
    ///
    /// A new account is seeded with the sign-up balances. An existing one
    /// goes through the daily reset like any other load.
    pub async fn sign_in(&self, identity: &AuthIdentity) -> Result<UserAccount> {
        let today = self.clock.today();

        match self.store.get_account(&identity.id).await? {
            Some(account) => {
                let mut current = account.clone();
                rules::apply_daily_reset(&mut current, today);
                current.logged_in = true;
                self.commit(&identity.id, &account, &current).await?;

                tracing::info!(account_id = %identity.id, "Account signed in");
                Ok(current)
            }
            None => {
                let account = UserAccount::seeded(identity, today, &self.rules);
                self.store.put_account(&identity.id, &account).await?;

                tracing::info!(
                    account_id = %identity.id,
                    display_name = %account.display_name,
                    bonus_balance = account.bonus_balance,
                    reward_balance = account.reward_balance,
                    "Account created"
                );
                Ok(account)
            }
        }
    }

    /// End the session of an account
    ///
    /// Only `loggedIn` changes. Balances and counters are left as stored.
    pub async fn sign_out(&self, id: &AccountId) -> Result<()> {
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))?;

        let mut current = account.clone();
        current.logged_in = false;
        self.commit(id, &account, &current).await?;

        tracing::info!(account_id = %id, "Account signed out");
        Ok(())
    }

    /// Fetch an account, zeroing stale daily counters first
    pub async fn load_account(&self, id: &AccountId) -> Result<UserAccount> {
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or_else(|| Error::AccountNotFound(id.to_string()))?;

        let mut current = account.clone();
        if rules::apply_daily_reset(&mut current, self.clock.today()) {
            self.commit(id, &account, &current).await?;
            tracing::info!(
                account_id = %id,
                last_reset_date = %current.last_reset_date,
                "Daily counters reset"
            );
        }

        Ok(current)
    }

    /// Credit an ad reward
    ///
    /// Refused with `DailyLimitReached` once the daily limit is used up.
    /// Milestone bonuses are paid in reward coins. No transaction record is
    /// written for ad claims.
    pub async fn claim_ad_reward(&self, id: &AccountId, reward: u64) -> Result<Outcome<AdClaim>> {
        let start = Instant::now();
        let account = self.load_account(id).await?;

        let mut next = account.clone();
        let claim = match rules::claim_ad(&mut next, reward, &self.rules) {
            Ok(claim) => claim,
            Err(rejection) => return Ok(self.reject("claim_ad_reward", id, rejection)),
        };

        self.commit(id, &account, &next).await?;

        self.notifier.notify(Notification::ad_reward(claim.reward));
        if claim.milestone_bonus > 0 {
            self.notifier.notify(Notification::milestone(claim.milestone_bonus));
            tracing::info!(
                account_id = %id,
                milestone_bonus = claim.milestone_bonus,
                ads_watched_today = claim.ads_watched_today,
                ads_watched_total = claim.ads_watched_total,
                "Milestone bonus granted"
            );
        }

        self.metrics.record_ad_claim(claim.reward, claim.milestone_bonus);
        self.observe("claim_ad_reward", start);

        tracing::debug!(
            account_id = %id,
            reward = claim.reward,
            ads_watched_today = claim.ads_watched_today,
            "Ad reward claimed"
        );

        Ok(Outcome::Applied(claim))
    }

    /// Credit bonus coins from `source` and record an EARN transaction
    pub async fn add_bonus_coins(
        &self,
        id: &AccountId,
        amount: u64,
        source: &str,
    ) -> Result<Outcome<Transaction>> {
        let start = Instant::now();
        let account = self.load_account(id).await?;

        let mut next = account.clone();
        if let Err(rejection) = rules::credit_bonus(&mut next, amount) {
            return Ok(self.reject("add_bonus_coins", id, rejection));
        }

        self.commit(id, &account, &next).await?;

        let tx = Transaction::new(
            TransactionKind::Earn,
            amount,
            CoinCurrency::Bonus,
            TransactionStatus::Completed,
            self.clock.now(),
        )
        .with_source(source);
        self.store.append_transaction(id, &tx).await?;

        self.notifier.notify(Notification::bonus_earned(amount, source));
        self.metrics.record_bonus_credit(amount);
        self.observe("add_bonus_coins", start);

        tracing::info!(account_id = %id, amount, source, tx_id = %tx.id, "Bonus coins credited");

        Ok(Outcome::Applied(tx))
    }

    /// Exchange bonus coins for reward coins
    ///
    /// The transaction records the reward amount received.
    pub async fn convert_coins(
        &self,
        id: &AccountId,
        bonus_amount: u64,
    ) -> Result<Outcome<Transaction>> {
        let start = Instant::now();
        let account = self.load_account(id).await?;

        let mut next = account.clone();
        let reward_amount = match rules::convert(&mut next, bonus_amount, &self.rules) {
            Ok(reward_amount) => reward_amount,
            Err(rejection) => return Ok(self.reject("convert_coins", id, rejection)),
        };

        self.commit(id, &account, &next).await?;

        let tx = Transaction::new(
            TransactionKind::Convert,
            reward_amount,
            CoinCurrency::Reward,
            TransactionStatus::Completed,
            self.clock.now(),
        );
        self.store.append_transaction(id, &tx).await?;

        self.metrics.record_conversion();
        self.observe("convert_coins", start);

        tracing::info!(
            account_id = %id,
            bonus_amount,
            reward_amount,
            tx_id = %tx.id,
            "Coins converted"
        );

        Ok(Outcome::Applied(tx))
    }

    /// Queue a reward-coin withdrawal to `address`
    ///
    /// The balance is debited immediately; the record stays PENDING until
    /// settled outside the ledger.
    pub async fn withdraw_coins(
        &self,
        id: &AccountId,
        amount: u64,
        address: &str,
    ) -> Result<Outcome<Transaction>> {
        let start = Instant::now();

        let address = match WalletAddress::parse(address) {
            Some(address) => address,
            None => return Ok(self.reject("withdraw_coins", id, Rejection::InvalidAddress)),
        };

        let account = self.load_account(id).await?;

        let mut next = account.clone();
        if let Err(rejection) = rules::withdraw(&mut next, amount) {
            return Ok(self.reject("withdraw_coins", id, rejection));
        }

        self.commit(id, &account, &next).await?;

        let tx = Transaction::new(
            TransactionKind::Withdraw,
            amount,
            CoinCurrency::Reward,
            TransactionStatus::Pending,
            self.clock.now(),
        )
        .with_address(&address);
        self.store.append_transaction(id, &tx).await?;

        self.metrics.record_withdrawal();
        self.observe("withdraw_coins", start);

        tracing::info!(
            account_id = %id,
            amount,
            address = %address,
            tx_id = %tx.id,
            "Withdrawal queued"
        );

        Ok(Outcome::Applied(tx))
    }

    /// Transaction history, newest first
    pub async fn transactions(&self, id: &AccountId) -> Result<Vec<Transaction>> {
        let mut history = self.store.transactions(id).await?;
        history.reverse();
        Ok(history)
    }

    /// Users referred by `id`
    pub async fn referrals(&self, id: &AccountId) -> Result<Vec<Referral>> {
        self.store.referrals(id).await
    }

    /// Write back the fields that changed between `before` and `after`
    async fn commit(&self, id: &AccountId, before: &UserAccount, after: &UserAccount) -> Result<()> {
        let patch = AccountPatch::diff(before, after);
        if patch.is_empty() {
            return Ok(());
        }
        self.store.update_account(id, &patch).await
    }

    fn reject<T>(&self, operation: &str, id: &AccountId, rejection: Rejection) -> Outcome<T> {
        self.metrics.record_rejection(rejection.reason());
        tracing::info!(
            account_id = %id,
            operation,
            reason = rejection.reason(),
            "Operation rejected: {}",
            rejection
        );
        Outcome::Rejected(rejection)
    }

    fn observe(&self, operation: &str, start: Instant) {
        self.metrics
            .record_duration(operation, start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::notify::MemorySink;
    use chrono::NaiveDate;

    const ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    struct Fixture {
        ledger: RewardLedger,
        store: Arc<MemoryStore>,
        sink: Arc<MemorySink>,
        clock: Arc<FixedClock>,
        id: AccountId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new());
        let clock = Arc::new(FixedClock::at_date(
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
        ));

        let ledger = RewardLedger::new(store.clone(), RewardRules::default())
            .unwrap()
            .with_notifier(sink.clone())
            .with_clock(clock.clone());

        let id = AccountId::new("uid-1");
        let identity = AuthIdentity {
            id: id.clone(),
            display_name: Some("tester".to_string()),
            email: None,
        };
        ledger.sign_in(&identity).await.unwrap();

        Fixture {
            ledger,
            store,
            sink,
            clock,
            id,
        }
    }

    #[tokio::test]
    async fn test_sign_in_seeds_once() {
        let f = fixture().await;
        let account = f.ledger.load_account(&f.id).await.unwrap();
        assert_eq!(account.bonus_balance, 1200);
        assert_eq!(account.reward_balance, 50);

        f.ledger.convert_coins(&f.id, 200).await.unwrap();

        // Second sign-in keeps the balances
        let identity = AuthIdentity {
            id: f.id.clone(),
            display_name: None,
            email: None,
        };
        let account = f.ledger.sign_in(&identity).await.unwrap();
        assert_eq!(account.bonus_balance, 1000);
        assert_eq!(account.display_name, "tester");
        assert_eq!(f.store.account_count(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_only() {
        let f = fixture().await;
        f.ledger.add_bonus_coins(&f.id, 30, "promo").await.unwrap();
        let before = f.store.get_account(&f.id).await.unwrap().unwrap();
        assert!(before.logged_in);

        f.ledger.sign_out(&f.id).await.unwrap();

        let stored = f.store.get_account(&f.id).await.unwrap().unwrap();
        assert!(!stored.logged_in);
        assert_eq!(stored.bonus_balance, before.bonus_balance);
        assert_eq!(stored.reward_balance, before.reward_balance);
        assert_eq!(stored.earned_today, before.earned_today);

        let identity = AuthIdentity {
            id: f.id.clone(),
            display_name: None,
            email: None,
        };
        assert!(f.ledger.sign_in(&identity).await.unwrap().logged_in);
        assert!(f.store.get_account(&f.id).await.unwrap().unwrap().logged_in);
    }

    #[tokio::test]
    async fn test_sign_out_unknown_account() {
        let f = fixture().await;
        let result = f.ledger.sign_out(&AccountId::new("ghost")).await;
        assert!(matches!(result, Err(Error::AccountNotFound(_))));
    }

    #[test]
    fn test_new_rejects_unusable_rules() {
        let store: Arc<dyn AccountStore> = Arc::new(MemoryStore::new());

        let mut rules = RewardRules::default();
        rules.conversion_unit = 0;
        assert!(matches!(
            RewardLedger::new(store.clone(), rules),
            Err(Error::Config(_))
        ));

        let mut rules = RewardRules::default();
        rules.ad_reward_min = 41;
        assert!(matches!(
            RewardLedger::new(store, rules),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_convert_scenario() {
        let f = fixture().await;

        let outcome = f.ledger.convert_coins(&f.id, 500).await.unwrap();
        assert!(outcome.is_applied());

        let tx = outcome.applied().unwrap();
        assert_eq!(tx.kind, TransactionKind::Convert);
        assert_eq!(tx.amount, 25);
        assert_eq!(tx.currency, CoinCurrency::Reward);
        assert_eq!(tx.status, TransactionStatus::Completed);

        let account = f.ledger.load_account(&f.id).await.unwrap();
        assert_eq!(account.bonus_balance, 700);
        assert_eq!(account.reward_balance, 75);
    }

    #[tokio::test]
    async fn test_convert_insufficient_balance() {
        let f = fixture().await;

        let outcome = f.ledger.convert_coins(&f.id, 5000).await.unwrap();
        assert!(!outcome.is_applied());
        assert!(matches!(
            outcome.rejection(),
            Some(Rejection::InsufficientBalance { .. })
        ));
        assert!(f.ledger.transactions(&f.id).await.unwrap().is_empty());
        assert_eq!(
            f.ledger
                .metrics()
                .rejections
                .with_label_values(&["insufficient_balance"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_withdraw_scenarios() {
        let f = fixture().await;

        // Insufficient: balance is 50
        let outcome = f.ledger.withdraw_coins(&f.id, 60, ADDRESS).await.unwrap();
        assert!(!outcome.is_applied());

        // Bad address
        let outcome = f.ledger.withdraw_coins(&f.id, 10, "0xabc").await.unwrap();
        assert_eq!(outcome.rejection(), Some(&Rejection::InvalidAddress));

        let account = f.ledger.load_account(&f.id).await.unwrap();
        assert_eq!(account.reward_balance, 50);

        let outcome = f.ledger.withdraw_coins(&f.id, 30, ADDRESS).await.unwrap();
        let tx = outcome.into_result().unwrap();
        assert_eq!(tx.kind, TransactionKind::Withdraw);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.address.as_deref(), Some(ADDRESS));

        let account = f.ledger.load_account(&f.id).await.unwrap();
        assert_eq!(account.reward_balance, 20);
    }

    #[tokio::test]
    async fn test_claim_ad_double_milestone() {
        let f = fixture().await;

        let patch = AccountPatch {
            ads_watched_today: Some(499),
            ads_watched_total: Some(999),
            ..Default::default()
        };
        f.store.update_account(&f.id, &patch).await.unwrap();

        let claim = f
            .ledger
            .claim_ad_reward(&f.id, 20)
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(claim.milestone_bonus, 1100);

        let account = f.ledger.load_account(&f.id).await.unwrap();
        assert_eq!(account.ads_watched_today, 500);
        assert_eq!(account.ads_watched_total, 1000);
        assert_eq!(account.bonus_balance, 1220);
        assert_eq!(account.reward_balance, 1150);

        // Two notifications, no transaction record
        let delivered = f.sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[1], Notification::milestone(1100));
        assert!(f.ledger.transactions(&f.id).await.unwrap().is_empty());

        // Limit reached for the rest of the day
        let outcome = f.ledger.claim_ad_reward(&f.id, 20).await.unwrap();
        assert_eq!(
            outcome.rejection(),
            Some(&Rejection::DailyLimitReached { limit: 500 })
        );
    }

    #[tokio::test]
    async fn test_daily_reset_on_load() {
        let f = fixture().await;

        f.ledger.claim_ad_reward(&f.id, 30).await.unwrap();
        f.ledger.convert_coins(&f.id, 100).await.unwrap();

        let before = f.ledger.load_account(&f.id).await.unwrap();
        assert_eq!(before.ads_watched_today, 1);
        assert_eq!(before.earned_today, 30);
        assert_eq!(before.reward_earned_today, 5);

        f.clock.advance_days(1);
        let after = f.ledger.load_account(&f.id).await.unwrap();
        assert_eq!(after.ads_watched_today, 0);
        assert_eq!(after.earned_today, 0);
        assert_eq!(after.reward_earned_today, 0);
        assert_eq!(after.last_reset_date, f.clock.today());
        assert_eq!(after.ads_watched_total, 1);
        assert_eq!(after.bonus_balance, before.bonus_balance);
        assert_eq!(after.reward_earned_total, before.reward_earned_total);

        // Reset was persisted
        let stored = f.store.get_account(&f.id).await.unwrap().unwrap();
        assert_eq!(stored, after);
    }

    #[tokio::test]
    async fn test_add_bonus_and_history_order() {
        let f = fixture().await;

        f.ledger.add_bonus_coins(&f.id, 50, "daily check-in").await.unwrap();
        f.ledger.convert_coins(&f.id, 100).await.unwrap();

        let history = f.ledger.transactions(&f.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransactionKind::Convert);
        assert_eq!(history[1].kind, TransactionKind::Earn);
        assert_eq!(history[1].source.as_deref(), Some("daily check-in"));

        let account = f.ledger.load_account(&f.id).await.unwrap();
        assert_eq!(account.bonus_balance, 1150);
        assert_eq!(account.earned_today, 50);

        assert_eq!(
            f.sink.delivered(),
            vec![Notification::bonus_earned(50, "daily check-in")]
        );
    }

    #[tokio::test]
    async fn test_unknown_account_is_an_error() {
        let f = fixture().await;
        let ghost = AccountId::new("ghost");

        let result = f.ledger.claim_ad_reward(&ghost, 20).await;
        assert!(matches!(result, Err(Error::AccountNotFound(_))));
    }
}
