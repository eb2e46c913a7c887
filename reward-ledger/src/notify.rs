//! User notifications
//!
//! Delivery is fire-and-forget: a sink never reports failure back to the
//! ledger, and a lost notification never rolls back a balance change.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Local notification shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Title line
    pub title: String,
    /// Body text
    pub body: String,
}

impl Notification {
    /// Create a notification
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Base reward for a claimed ad
    pub fn ad_reward(reward: u64) -> Self {
        Self::new(
            "Ad Reward Claimed!",
            format!("You earned {} Bonus Coins.", reward),
        )
    }

    /// Milestone bonus granted on an ad claim
    pub fn milestone(bonus: u64) -> Self {
        Self::new(
            "Milestone Reached!",
            format!("You earned an extra {} reward coins!", bonus),
        )
    }

    /// Bonus coins credited from `source`
    pub fn bonus_earned(amount: u64, source: &str) -> Self {
        Self::new(
            "Bonus Earned!",
            format!("You received {} Bonus Coins from {}.", amount, source),
        )
    }
}

/// Destination for notifications
pub trait NotificationSink: Send + Sync {
    /// Deliver best-effort; must not block or fail
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        tracing::info!(
            title = %notification.title,
            body = %notification.body,
            "Notification"
        );
    }
}

/// Forwards notifications to a channel consumer (push gateway, UI bridge)
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiving end
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.sender.send(notification) {
            tracing::warn!(title = %e.0.title, "Notification dropped: receiver closed");
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<Notification>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications delivered so far
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().clone()
    }

    /// Drain delivered notifications
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.delivered.lock())
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: Notification) {
        self.delivered.lock().push(notification);
    }
}
