//! Referral milestones and airdrop eligibility
//!
//! Read-only views over an account. Nothing here mutates balances; milestone
//! rewards are shown to the user but credited outside the ledger.

use serde::{Deserialize, Serialize};

use crate::types::UserAccount;

/// Referral count target and the reward coins promised for reaching it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    /// Referrals required
    pub target: u64,
    /// Reward coins promised
    pub reward: u64,
}

/// Referral milestone ladder, ascending by target
pub const REFERRAL_MILESTONES: [Milestone; 7] = [
    Milestone { target: 100, reward: 500 },
    Milestone { target: 250, reward: 1_000 },
    Milestone { target: 500, reward: 2_000 },
    Milestone { target: 750, reward: 3_000 },
    Milestone { target: 1_000, reward: 5_000 },
    Milestone { target: 5_000, reward: 10_000 },
    Milestone { target: 10_000, reward: 100_000 },
];

/// Where a referral count sits on the milestone ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneProgress {
    /// Milestones already reached
    pub level: usize,
    /// Next milestone, `None` once the ladder is complete
    pub next: Option<Milestone>,
    /// Progress from the previous milestone to the next, 0..=100
    pub percent: u8,
}

/// Progress of `referral_count` along [`REFERRAL_MILESTONES`]
pub fn milestone_progress(referral_count: u64) -> MilestoneProgress {
    let level = REFERRAL_MILESTONES
        .iter()
        .take_while(|m| referral_count >= m.target)
        .count();

    let next = REFERRAL_MILESTONES.get(level).copied();
    let percent = match next {
        None => 100,
        Some(next) => {
            let floor = level
                .checked_sub(1)
                .map(|i| REFERRAL_MILESTONES[i].target)
                .unwrap_or(0);
            let range = next.target - floor;
            let done = referral_count.saturating_sub(floor);
            (done * 100 / range).min(100) as u8
        }
    };

    MilestoneProgress {
        level,
        next,
        percent,
    }
}

/// Referrals needed to qualify for the airdrop
pub const AIRDROP_MIN_REFERRALS: u64 = 10;

/// Reward coins needed to qualify for the airdrop
pub const AIRDROP_MIN_REWARD_BALANCE: u64 = 100;

/// Airdrop qualification checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirdropEligibility {
    /// Enough referrals
    pub referrals_met: bool,
    /// Enough reward coins
    pub balance_met: bool,
}

impl AirdropEligibility {
    /// All conditions met
    pub fn is_eligible(&self) -> bool {
        self.referrals_met && self.balance_met
    }
}

/// Check an account against the airdrop conditions
pub fn airdrop_eligibility(account: &UserAccount) -> AirdropEligibility {
    AirdropEligibility {
        referrals_met: account.referral_count >= AIRDROP_MIN_REFERRALS,
        balance_met: account.reward_balance >= AIRDROP_MIN_REWARD_BALANCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewardRules;
    use crate::types::{AccountId, AuthIdentity};
    use chrono::NaiveDate;

    #[test]
    fn test_milestone_progress() {
        let start = milestone_progress(0);
        assert_eq!(start.level, 0);
        assert_eq!(start.next, Some(REFERRAL_MILESTONES[0]));
        assert_eq!(start.percent, 0);

        let halfway = milestone_progress(50);
        assert_eq!(halfway.percent, 50);

        let second = milestone_progress(175);
        assert_eq!(second.level, 1);
        assert_eq!(second.next.unwrap().target, 250);
        assert_eq!(second.percent, 50);

        let exact = milestone_progress(250);
        assert_eq!(exact.level, 2);
        assert_eq!(exact.percent, 0);

        let done = milestone_progress(20_000);
        assert_eq!(done.level, REFERRAL_MILESTONES.len());
        assert_eq!(done.next, None);
        assert_eq!(done.percent, 100);
    }

    #[test]
    fn test_airdrop_eligibility() {
        let identity = AuthIdentity {
            id: AccountId::new("uid-1"),
            display_name: None,
            email: None,
        };
        let mut account = UserAccount::seeded(
            &identity,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &RewardRules::default(),
        );

        let check = airdrop_eligibility(&account);
        assert!(!check.referrals_met);
        assert!(!check.balance_met);

        account.referral_count = 10;
        account.reward_balance = 100;
        assert!(airdrop_eligibility(&account).is_eligible());
    }
}
