//! Core types for the reward ledger
//!
//! All types are designed for:
//! - Document-store compatibility (camelCase field names)
//! - Deterministic serialization (bincode in the RocksDB adapter)
//! - Integral coin amounts (`u64`, never fractional)

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::config::RewardRules;

/// Account identifier (opaque id from the authentication provider)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signed-in identity handed over by the authentication provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    /// Provider user id
    pub id: AccountId,
    /// Provider display name, if any
    pub display_name: Option<String>,
    /// Provider email, if any
    pub email: Option<String>,
}

impl AuthIdentity {
    /// Name shown for a freshly created account.
    ///
    /// Falls back to the email local part, then to `"User"`.
    pub fn preferred_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }

        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }
}

/// A user's balances and counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// Session flag, set while a client is signed in
    #[serde(default)]
    pub logged_in: bool,

    /// Display name
    pub display_name: String,

    /// Calendar date of first sign-in
    pub join_date: NaiveDate,

    /// Bonus coins (earned from ads and bonuses)
    pub bonus_balance: u64,

    /// Reward coins (converted or granted, withdrawable)
    pub reward_balance: u64,

    /// Bonus coins earned since the last daily reset
    pub earned_today: u64,

    /// Reward coins earned since the last daily reset
    pub reward_earned_today: u64,

    /// Reward coins earned over the account lifetime
    pub reward_earned_total: u64,

    /// Number of referred users
    pub referral_count: u64,

    /// Ads claimed since the last daily reset
    pub ads_watched_today: u64,

    /// Ads claimed over the account lifetime
    pub ads_watched_total: u64,

    /// Day the daily counters were last zeroed
    pub last_reset_date: NaiveDate,
}

impl UserAccount {
    /// Record created on first authentication
    pub fn seeded(identity: &AuthIdentity, today: NaiveDate, rules: &RewardRules) -> Self {
        Self {
            logged_in: true,
            display_name: identity.preferred_name(),
            join_date: today,
            bonus_balance: rules.signup_bonus_coins,
            reward_balance: rules.signup_reward_coins,
            earned_today: 0,
            reward_earned_today: 0,
            reward_earned_total: rules.signup_reward_coins,
            referral_count: 0,
            ads_watched_today: 0,
            ads_watched_total: 0,
            last_reset_date: today,
        }
    }

    /// Whether the daily counters belong to a day other than `today`
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.last_reset_date != today
    }
}

/// Kind of ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Bonus coins earned
    Earn,
    /// Bonus coins exchanged for reward coins
    Convert,
    /// Reward coins sent to an external address
    Withdraw,
    /// Referral reward
    Referral,
    /// Promotional bonus
    Bonus,
}

impl TransactionKind {
    /// Wire label
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Earn => "EARN",
            TransactionKind::Convert => "CONVERT",
            TransactionKind::Withdraw => "WITHDRAW",
            TransactionKind::Referral => "REFERRAL",
            TransactionKind::Bonus => "BONUS",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Coin a transaction is denominated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoinCurrency {
    /// Bonus coins
    Bonus,
    /// Reward coins
    Reward,
}

impl fmt::Display for CoinCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinCurrency::Bonus => write!(f, "BONUS"),
            CoinCurrency::Reward => write!(f, "REWARD"),
        }
    }
}

/// Settlement status of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Applied
    Completed,
    /// Awaiting external settlement
    Pending,
    /// Granted but not yet spendable
    Locked,
}

/// Append-only transaction record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique id (UUIDv7, time-ordered)
    pub id: Uuid,

    /// Transaction kind
    #[serde(rename = "type")]
    pub kind: TransactionKind,

    /// Amount in `currency`
    pub amount: u64,

    /// Denomination
    pub currency: CoinCurrency,

    /// Creation time
    pub date: DateTime<Utc>,

    /// Status
    pub status: TransactionStatus,

    /// Where an earn came from (ad network, promo, ...)
    pub source: Option<String>,

    /// Withdrawal destination
    pub address: Option<String>,
}

impl Transaction {
    /// New record stamped with a fresh id
    pub fn new(
        kind: TransactionKind,
        amount: u64,
        currency: CoinCurrency,
        status: TransactionStatus,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            amount,
            currency,
            date,
            status,
            source: None,
            address: None,
        }
    }

    /// Tag with an earn source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Tag with a withdrawal address
    pub fn with_address(mut self, address: &WalletAddress) -> Self {
        self.address = Some(address.as_str().to_string());
        self
    }
}

/// Referral status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferralStatus {
    /// Referred user is active
    Active,
    /// Referred user went quiet
    Inactive,
}

/// Referred user, read-only from the ledger's point of view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    /// Referred user's name
    pub username: String,
    /// Day of referral
    pub date: NaiveDate,
    /// Status
    pub status: ReferralStatus,
}

/// EVM-style withdrawal address (`0x` followed by 40 hex digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletAddress(String);

fn address_regex() -> &'static Regex {
    static ADDRESS: OnceLock<Regex> = OnceLock::new();
    ADDRESS.get_or_init(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("static address pattern"))
}

impl WalletAddress {
    /// Parse a user-supplied address; surrounding whitespace is ignored
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if address_regex().is_match(trimmed) {
            Some(Self(trimmed.to_string()))
        } else {
            None
        }
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Partial update of a [`UserAccount`] document
///
/// Only `Some` fields are written. Produced by [`AccountPatch::diff`] so a
/// store update touches exactly the fields an operation changed.
#[allow(missing_docs)] // fields mirror UserAccount
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logged_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bonus_balance: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_balance: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earned_today: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_earned_today: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward_earned_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ads_watched_today: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ads_watched_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reset_date: Option<NaiveDate>,
}

macro_rules! diff_field {
    ($patch:ident, $before:ident, $after:ident, $($field:ident),+ $(,)?) => {
        $(
            if $before.$field != $after.$field {
                $patch.$field = Some($after.$field.clone());
            }
        )+
    };
}

macro_rules! apply_field {
    ($patch:ident, $account:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$patch.$field {
                $account.$field = value.clone();
            }
        )+
    };
}

impl AccountPatch {
    /// Fields that differ between two versions of the same account
    pub fn diff(before: &UserAccount, after: &UserAccount) -> Self {
        let mut patch = Self::default();
        diff_field!(
            patch,
            before,
            after,
            logged_in,
            display_name,
            bonus_balance,
            reward_balance,
            earned_today,
            reward_earned_today,
            reward_earned_total,
            referral_count,
            ads_watched_today,
            ads_watched_total,
            last_reset_date,
        );
        patch
    }

    /// Write the patched fields into `account`
    pub fn apply_to(&self, account: &mut UserAccount) {
        let patch = self;
        apply_field!(
            patch,
            account,
            logged_in,
            display_name,
            bonus_balance,
            reward_balance,
            earned_today,
            reward_earned_today,
            reward_earned_total,
            referral_count,
            ads_watched_today,
            ads_watched_total,
            last_reset_date,
        );
    }

    /// True when nothing changed
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
