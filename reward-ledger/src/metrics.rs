//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `reward_ledger_ads_claimed_total` - Ad rewards credited
//! - `reward_ledger_bonus_coins_credited_total` - Bonus coins credited (ads + bonuses)
//! - `reward_ledger_conversions_total` - Successful conversions
//! - `reward_ledger_withdrawals_total` - Withdrawals queued as pending
//! - `reward_ledger_milestones_total` - Milestone bonuses granted
//! - `reward_ledger_rejections_total{reason}` - Refused operations
//! - `reward_ledger_operation_duration_seconds{operation}` - Operation latency
//!
//! Metrics live on a private registry so several ledgers can coexist in
//! one process.

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Ad rewards credited
    pub ads_claimed: IntCounter,

    /// Bonus coins credited
    pub bonus_coins_credited: IntCounter,

    /// Successful conversions
    pub conversions: IntCounter,

    /// Pending withdrawals recorded
    pub withdrawals: IntCounter,

    /// Milestone bonuses granted
    pub milestones: IntCounter,

    /// Rejections by reason
    pub rejections: IntCounterVec,

    /// Operation latency by operation
    pub operation_duration: HistogramVec,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let ads_claimed = IntCounter::new(
            "reward_ledger_ads_claimed_total",
            "Total number of ad rewards credited",
        )?;
        registry.register(Box::new(ads_claimed.clone()))?;

        let bonus_coins_credited = IntCounter::new(
            "reward_ledger_bonus_coins_credited_total",
            "Total bonus coins credited",
        )?;
        registry.register(Box::new(bonus_coins_credited.clone()))?;

        let conversions = IntCounter::new(
            "reward_ledger_conversions_total",
            "Total number of bonus-to-reward conversions",
        )?;
        registry.register(Box::new(conversions.clone()))?;

        let withdrawals = IntCounter::new(
            "reward_ledger_withdrawals_total",
            "Total number of pending withdrawals recorded",
        )?;
        registry.register(Box::new(withdrawals.clone()))?;

        let milestones = IntCounter::new(
            "reward_ledger_milestones_total",
            "Total number of milestone bonuses granted",
        )?;
        registry.register(Box::new(milestones.clone()))?;

        let rejections = IntCounterVec::new(
            Opts::new(
                "reward_ledger_rejections_total",
                "Refused ledger operations by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rejections.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "reward_ledger_operation_duration_seconds",
                "Histogram of ledger operation latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            ads_claimed,
            bonus_coins_credited,
            conversions,
            withdrawals,
            milestones,
            rejections,
            operation_duration,
            registry,
        })
    }

    /// Record an ad claim
    pub fn record_ad_claim(&self, reward: u64, milestone_bonus: u64) {
        self.ads_claimed.inc();
        self.bonus_coins_credited.inc_by(reward);
        if milestone_bonus > 0 {
            self.milestones.inc();
        }
    }

    /// Record a bonus credit
    pub fn record_bonus_credit(&self, amount: u64) {
        self.bonus_coins_credited.inc_by(amount);
    }

    /// Record a conversion
    pub fn record_conversion(&self) {
        self.conversions.inc();
    }

    /// Record a withdrawal
    pub fn record_withdrawal(&self) {
        self.withdrawals.inc();
    }

    /// Record a rejection
    pub fn record_rejection(&self, reason: &str) {
        self.rejections.with_label_values(&[reason]).inc();
    }

    /// Record operation duration
    pub fn record_duration(&self, operation: &str, duration_seconds: f64) {
        self.operation_duration
            .with_label_values(&[operation])
            .observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
