//! Balance transition rules
//!
//! Pure functions over [`UserAccount`]: no I/O, no clock, no notifications.
//! Every transition validates first and mutates last, so a rejected call
//! leaves the account exactly as it was.
//!
//! # Invariants
//!
//! - Balances and counters never go below zero (`u64`, checked before debit)
//! - `ads_watched_today <= daily_ad_limit`
//! - Milestone bonuses fire on exact equality with the new counter value.
//!   Counters move by one per claim, so equality fires exactly once per
//!   crossing.

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RewardRules;
use crate::types::UserAccount;

/// Why a ledger operation was refused
///
/// These are expected business outcomes, returned to the caller as values.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    /// Not enough coins for a debit
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Balance at the time of the request
        available: u64,
        /// Amount asked for
        requested: u64,
    },

    /// Daily ad claims exhausted
    #[error("Daily ad limit of {limit} reached")]
    DailyLimitReached {
        /// Configured limit
        limit: u64,
    },

    /// Amount must be positive
    #[error("Amount must be positive")]
    InvalidAmount,

    /// Withdrawal address does not match `0x` + 40 hex digits
    #[error("Invalid withdrawal address")]
    InvalidAddress,
}

impl Rejection {
    /// Short label (metrics, logs)
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::InsufficientBalance { .. } => "insufficient_balance",
            Rejection::DailyLimitReached { .. } => "daily_limit_reached",
            Rejection::InvalidAmount => "invalid_amount",
            Rejection::InvalidAddress => "invalid_address",
        }
    }
}

/// Result of a successful ad claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdClaim {
    /// Bonus coins credited
    pub reward: u64,
    /// Reward coins granted by milestones on this claim (0 if none)
    pub milestone_bonus: u64,
    /// Daily ad count after the claim
    pub ads_watched_today: u64,
    /// Lifetime ad count after the claim
    pub ads_watched_total: u64,
}

impl RewardRules {
    /// Reward coins obtained for `bonus_amount` bonus coins (floored)
    pub fn conversion_quote(&self, bonus_amount: u64) -> u64 {
        bonus_amount
            .checked_div(self.conversion_unit)
            .unwrap_or(0)
            .saturating_mul(self.reward_per_unit)
    }

    /// Draw an ad reward uniformly from the configured range
    pub fn roll_ad_reward<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        rng.gen_range(self.ad_reward_min..=self.ad_reward_max)
    }
}

/// Zero the daily counters if they belong to another day.
///
/// Returns true when a reset happened. Only `ads_watched_today`,
/// `earned_today`, `reward_earned_today` and `last_reset_date` change.
pub fn apply_daily_reset(account: &mut UserAccount, today: NaiveDate) -> bool {
    if !account.is_stale(today) {
        return false;
    }

    account.ads_watched_today = 0;
    account.earned_today = 0;
    account.reward_earned_today = 0;
    account.last_reset_date = today;
    true
}

/// Credit an ad reward, plus any milestone bonus reached by this claim
pub fn claim_ad(
    account: &mut UserAccount,
    reward: u64,
    rules: &RewardRules,
) -> Result<AdClaim, Rejection> {
    if reward == 0 {
        return Err(Rejection::InvalidAmount);
    }
    if account.ads_watched_today >= rules.daily_ad_limit {
        return Err(Rejection::DailyLimitReached {
            limit: rules.daily_ad_limit,
        });
    }

    let ads_watched_today = account.ads_watched_today + 1;
    let ads_watched_total = account.ads_watched_total.saturating_add(1);

    let mut milestone_bonus = 0u64;
    if ads_watched_today == rules.daily_ad_limit {
        milestone_bonus += rules.daily_milestone_bonus;
    }
    if ads_watched_total == rules.lifetime_ad_milestone {
        milestone_bonus += rules.lifetime_milestone_bonus;
    }

    account.ads_watched_today = ads_watched_today;
    account.ads_watched_total = ads_watched_total;
    account.bonus_balance = account.bonus_balance.saturating_add(reward);
    account.earned_today = account.earned_today.saturating_add(reward);
    credit_reward(account, milestone_bonus);

    Ok(AdClaim {
        reward,
        milestone_bonus,
        ads_watched_today,
        ads_watched_total,
    })
}

/// Credit bonus coins from an arbitrary source
pub fn credit_bonus(account: &mut UserAccount, amount: u64) -> Result<(), Rejection> {
    if amount == 0 {
        return Err(Rejection::InvalidAmount);
    }

    account.bonus_balance = account.bonus_balance.saturating_add(amount);
    account.earned_today = account.earned_today.saturating_add(amount);
    Ok(())
}

/// Exchange bonus coins for reward coins; returns the reward amount
pub fn convert(
    account: &mut UserAccount,
    bonus_amount: u64,
    rules: &RewardRules,
) -> Result<u64, Rejection> {
    if bonus_amount == 0 {
        return Err(Rejection::InvalidAmount);
    }
    if account.bonus_balance < bonus_amount {
        return Err(Rejection::InsufficientBalance {
            available: account.bonus_balance,
            requested: bonus_amount,
        });
    }

    let reward_amount = rules.conversion_quote(bonus_amount);
    account.bonus_balance -= bonus_amount;
    credit_reward(account, reward_amount);
    Ok(reward_amount)
}

/// Debit reward coins for a withdrawal
pub fn withdraw(account: &mut UserAccount, amount: u64) -> Result<(), Rejection> {
    if amount == 0 {
        return Err(Rejection::InvalidAmount);
    }
    if account.reward_balance < amount {
        return Err(Rejection::InsufficientBalance {
            available: account.reward_balance,
            requested: amount,
        });
    }

    account.reward_balance -= amount;
    Ok(())
}

fn credit_reward(account: &mut UserAccount, amount: u64) {
    if amount == 0 {
        return;
    }
    account.reward_balance = account.reward_balance.saturating_add(amount);
    account.reward_earned_today = account.reward_earned_today.saturating_add(amount);
    account.reward_earned_total = account.reward_earned_total.saturating_add(amount);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, AuthIdentity};
    use rand::{rngs::StdRng, SeedableRng};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn account() -> UserAccount {
        let identity = AuthIdentity {
            id: AccountId::new("uid-1"),
            display_name: Some("tester".to_string()),
            email: None,
        };
        UserAccount::seeded(&identity, today(), &RewardRules::default())
    }

    #[test]
    fn test_convert_scenario() {
        let rules = RewardRules::default();
        let mut account = account();
        let reward_before = account.reward_balance;

        let reward = convert(&mut account, 500, &rules).unwrap();
        assert_eq!(reward, 25);
        assert_eq!(account.bonus_balance, 700);
        assert_eq!(account.reward_balance, reward_before + 25);
        assert_eq!(account.reward_earned_today, 25);
        assert_eq!(account.reward_earned_total, 50 + 25);
    }

    #[test]
    fn test_convert_truncates_non_multiples() {
        let rules = RewardRules::default();
        let mut account = account();

        assert_eq!(convert(&mut account, 250, &rules).unwrap(), 10);
        assert_eq!(account.bonus_balance, 950);

        assert_eq!(convert(&mut account, 99, &rules).unwrap(), 0);
        assert_eq!(account.bonus_balance, 851);
    }

    #[test]
    fn test_convert_insufficient_balance_leaves_account_untouched() {
        let rules = RewardRules::default();
        let mut account = account();
        let before = account.clone();

        let err = convert(&mut account, 1300, &rules).unwrap_err();
        assert_eq!(
            err,
            Rejection::InsufficientBalance {
                available: 1200,
                requested: 1300
            }
        );
        assert_eq!(account, before);
    }

    #[test]
    fn test_withdraw_insufficient_balance() {
        let mut account = account();
        account.reward_balance = 10;
        let before = account.clone();

        let err = withdraw(&mut account, 50).unwrap_err();
        assert_eq!(err.reason(), "insufficient_balance");
        assert_eq!(account, before);

        withdraw(&mut account, 10).unwrap();
        assert_eq!(account.reward_balance, 0);
    }

    #[test]
    fn test_claim_ad_double_milestone() {
        let rules = RewardRules::default();
        let mut account = account();
        account.ads_watched_today = 499;
        account.ads_watched_total = 999;
        let bonus_before = account.bonus_balance;
        let reward_before = account.reward_balance;

        let claim = claim_ad(&mut account, 20, &rules).unwrap();
        assert_eq!(claim.milestone_bonus, 1100);
        assert_eq!(account.ads_watched_today, 500);
        assert_eq!(account.ads_watched_total, 1000);
        assert_eq!(account.bonus_balance, bonus_before + 20);
        assert_eq!(account.reward_balance, reward_before + 1100);
        assert_eq!(account.reward_earned_today, 1100);
    }

    #[test]
    fn test_claim_ad_daily_limit() {
        let rules = RewardRules::default();
        let mut account = account();
        account.ads_watched_today = 500;
        let before = account.clone();

        assert_eq!(
            claim_ad(&mut account, 20, &rules),
            Err(Rejection::DailyLimitReached { limit: 500 })
        );
        assert_eq!(account, before);
    }

    #[test]
    fn test_lifetime_milestone_fires_once() {
        let rules = RewardRules::default();
        let mut account = account();
        account.ads_watched_total = 998;

        let first = claim_ad(&mut account, 15, &rules).unwrap();
        let second = claim_ad(&mut account, 15, &rules).unwrap();
        let third = claim_ad(&mut account, 15, &rules).unwrap();

        assert_eq!(first.milestone_bonus, 0);
        assert_eq!(second.milestone_bonus, 100);
        assert_eq!(third.milestone_bonus, 0);
        assert_eq!(account.ads_watched_total, 1001);
    }

    #[test]
    fn test_zero_amounts_rejected() {
        let rules = RewardRules::default();
        let mut account = account();
        let before = account.clone();

        assert_eq!(claim_ad(&mut account, 0, &rules), Err(Rejection::InvalidAmount));
        assert_eq!(credit_bonus(&mut account, 0), Err(Rejection::InvalidAmount));
        assert_eq!(convert(&mut account, 0, &rules), Err(Rejection::InvalidAmount));
        assert_eq!(withdraw(&mut account, 0), Err(Rejection::InvalidAmount));
        assert_eq!(account, before);
    }

    #[test]
    fn test_daily_reset_touches_only_daily_fields() {
        let mut account = account();
        account.ads_watched_today = 42;
        account.ads_watched_total = 300;
        account.earned_today = 800;
        account.reward_earned_today = 25;
        account.reward_earned_total = 75;

        assert!(!apply_daily_reset(&mut account, today()));
        assert_eq!(account.ads_watched_today, 42);

        let tomorrow = today().succ_opt().unwrap();
        let mut expected = account.clone();
        expected.ads_watched_today = 0;
        expected.earned_today = 0;
        expected.reward_earned_today = 0;
        expected.last_reset_date = tomorrow;

        assert!(apply_daily_reset(&mut account, tomorrow));
        assert_eq!(account, expected);
    }

    #[test]
    fn test_roll_ad_reward_in_range() {
        let rules = RewardRules::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let reward = rules.roll_ad_reward(&mut rng);
            assert!((15..=40).contains(&reward));
        }
    }

    #[test]
    fn test_conversion_quote_zero_unit() {
        let rules = RewardRules {
            conversion_unit: 0,
            ..RewardRules::default()
        };
        assert_eq!(rules.conversion_quote(500), 0);
    }
}
