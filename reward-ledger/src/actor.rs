//! Actor-based single writer for the ledger
//!
//! One Tokio task owns the [`RewardLedger`] and handles requests one at a
//! time, so read-modify-write cycles inside this process never interleave.
//! Writers in other processes still race on the store (last write wins).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │            Client sessions / API handlers             │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │      RewardLedger: load → rules → update → append     │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    ledger::{Outcome, RewardLedger},
    rules::AdClaim,
    types::{AccountId, AuthIdentity, Referral, Transaction, UserAccount},
    Error, Result,
};
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Load or create an account for an identity
    SignIn {
        identity: AuthIdentity,
        response: oneshot::Sender<Result<UserAccount>>,
    },

    /// End the session of an account
    SignOut {
        id: AccountId,
        response: oneshot::Sender<Result<()>>,
    },

    /// Fetch an account (with daily reset)
    LoadAccount {
        id: AccountId,
        response: oneshot::Sender<Result<UserAccount>>,
    },

    /// Credit an ad reward
    ClaimAdReward {
        id: AccountId,
        reward: u64,
        response: oneshot::Sender<Result<Outcome<AdClaim>>>,
    },

    /// Credit bonus coins
    AddBonusCoins {
        id: AccountId,
        amount: u64,
        source: String,
        response: oneshot::Sender<Result<Outcome<Transaction>>>,
    },

    /// Convert bonus coins to reward coins
    ConvertCoins {
        id: AccountId,
        bonus_amount: u64,
        response: oneshot::Sender<Result<Outcome<Transaction>>>,
    },

    /// Withdraw reward coins
    WithdrawCoins {
        id: AccountId,
        amount: u64,
        address: String,
        response: oneshot::Sender<Result<Outcome<Transaction>>>,
    },

    /// Transaction history, newest first
    Transactions {
        id: AccountId,
        response: oneshot::Sender<Result<Vec<Transaction>>>,
    },

    /// Referral list
    Referrals {
        id: AccountId,
        response: oneshot::Sender<Result<Vec<Referral>>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    /// Ledger service
    ledger: RewardLedger,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(ledger: RewardLedger, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            if let LedgerMessage::Shutdown = msg {
                tracing::info!("Ledger actor shutting down");
                break;
            }
            self.handle_message(msg).await;
        }
    }

    /// Handle a single message
    ///
    /// A dropped response channel means the caller gave up; the operation
    /// has still been applied.
    async fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::SignIn { identity, response } => {
                let _ = response.send(self.ledger.sign_in(&identity).await);
            }

            LedgerMessage::SignOut { id, response } => {
                let _ = response.send(self.ledger.sign_out(&id).await);
            }

            LedgerMessage::LoadAccount { id, response } => {
                let _ = response.send(self.ledger.load_account(&id).await);
            }

            LedgerMessage::ClaimAdReward { id, reward, response } => {
                let result = self.ledger.claim_ad_reward(&id, reward).await;
                if let Err(ref e) = result {
                    tracing::error!(account_id = %id, "Ad claim failed: {}", e);
                }
                let _ = response.send(result);
            }

            LedgerMessage::AddBonusCoins {
                id,
                amount,
                source,
                response,
            } => {
                let result = self.ledger.add_bonus_coins(&id, amount, &source).await;
                if let Err(ref e) = result {
                    tracing::error!(account_id = %id, "Bonus credit failed: {}", e);
                }
                let _ = response.send(result);
            }

            LedgerMessage::ConvertCoins {
                id,
                bonus_amount,
                response,
            } => {
                let result = self.ledger.convert_coins(&id, bonus_amount).await;
                if let Err(ref e) = result {
                    tracing::error!(account_id = %id, "Conversion failed: {}", e);
                }
                let _ = response.send(result);
            }

            LedgerMessage::WithdrawCoins {
                id,
                amount,
                address,
                response,
            } => {
                let result = self.ledger.withdraw_coins(&id, amount, &address).await;
                if let Err(ref e) = result {
                    tracing::error!(account_id = %id, "Withdrawal failed: {}", e);
                }
                let _ = response.send(result);
            }

            LedgerMessage::Transactions { id, response } => {
                let _ = response.send(self.ledger.transactions(&id).await);
            }

            LedgerMessage::Referrals { id, response } => {
                let _ = response.send(self.ledger.referrals(&id).await);
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone, Debug)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Load or create the account for an identity
    pub async fn sign_in(&self, identity: AuthIdentity) -> Result<UserAccount> {
        self.request(|response| LedgerMessage::SignIn { identity, response })
            .await
    }

    /// End the session of an account
    pub async fn sign_out(&self, id: AccountId) -> Result<()> {
        self.request(|response| LedgerMessage::SignOut { id, response })
            .await
    }

    /// Fetch an account
    pub async fn load_account(&self, id: AccountId) -> Result<UserAccount> {
        self.request(|response| LedgerMessage::LoadAccount { id, response })
            .await
    }

    /// Credit an ad reward
    pub async fn claim_ad_reward(&self, id: AccountId, reward: u64) -> Result<Outcome<AdClaim>> {
        self.request(|response| LedgerMessage::ClaimAdReward {
            id,
            reward,
            response,
        })
        .await
    }

    /// Credit bonus coins
    pub async fn add_bonus_coins(
        &self,
        id: AccountId,
        amount: u64,
        source: impl Into<String>,
    ) -> Result<Outcome<Transaction>> {
        let source = source.into();
        self.request(|response| LedgerMessage::AddBonusCoins {
            id,
            amount,
            source,
            response,
        })
        .await
    }

    /// Convert bonus coins to reward coins
    pub async fn convert_coins(
        &self,
        id: AccountId,
        bonus_amount: u64,
    ) -> Result<Outcome<Transaction>> {
        self.request(|response| LedgerMessage::ConvertCoins {
            id,
            bonus_amount,
            response,
        })
        .await
    }

    /// Withdraw reward coins
    pub async fn withdraw_coins(
        &self,
        id: AccountId,
        amount: u64,
        address: impl Into<String>,
    ) -> Result<Outcome<Transaction>> {
        let address = address.into();
        self.request(|response| LedgerMessage::WithdrawCoins {
            id,
            amount,
            address,
            response,
        })
        .await
    }

    /// Transaction history, newest first
    pub async fn transactions(&self, id: AccountId) -> Result<Vec<Transaction>> {
        self.request(|response| LedgerMessage::Transactions { id, response })
            .await
    }

    /// Referral list
    pub async fn referrals(&self, id: AccountId) -> Result<Vec<Referral>> {
        self.request(|response| LedgerMessage::Referrals { id, response })
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(ledger: RewardLedger, mailbox_capacity: usize) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity.max(1)); // Bounded channel for backpressure
    let actor = LedgerActor::new(ledger, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
