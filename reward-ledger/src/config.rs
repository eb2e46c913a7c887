//! Configuration for the reward ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Which account store backs the ledger
    pub store: StoreBackend,

    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Reward rules
    pub rules: RewardRules,

    /// Actor configuration
    pub actor: ActorConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            service_name: "reward-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            store: StoreBackend::RocksDb,
            data_dir: PathBuf::from("./data/reward-ledger"),
            rocksdb: RocksDBConfig::default(),
            rules: RewardRules::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// Account store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, lost on exit
    Memory,
    /// RocksDB under `data_dir`
    RocksDb,
}

impl FromStr for StoreBackend {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "rocksdb" => Ok(StoreBackend::RocksDb),
            _ => Err(crate::Error::Config(format!("Unknown store backend: {}", s))),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Constants governing balance transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardRules {
    /// Ad claims allowed per day
    pub daily_ad_limit: u64,

    /// Reward coins granted when the daily ad count reaches `daily_ad_limit`
    pub daily_milestone_bonus: u64,

    /// Lifetime ad count that triggers the one-time bonus
    pub lifetime_ad_milestone: u64,

    /// Reward coins granted at `lifetime_ad_milestone`
    pub lifetime_milestone_bonus: u64,

    /// Bonus coins per conversion unit
    pub conversion_unit: u64,

    /// Reward coins per conversion unit
    pub reward_per_unit: u64,

    /// Bonus coins seeded on first sign-in
    pub signup_bonus_coins: u64,

    /// Reward coins seeded on first sign-in
    pub signup_reward_coins: u64,

    /// Smallest ad reward
    pub ad_reward_min: u64,

    /// Largest ad reward
    pub ad_reward_max: u64,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self {
            daily_ad_limit: 500,
            daily_milestone_bonus: 1000,
            lifetime_ad_milestone: 1000,
            lifetime_milestone_bonus: 100,
            conversion_unit: 100,   // 100 bonus = 5 reward
            reward_per_unit: 5,
            signup_bonus_coins: 1200,
            signup_reward_coins: 50,
            ad_reward_min: 15,
            ad_reward_max: 40,
        }
    }
}

impl RewardRules {
    /// Check the rules are usable
    pub fn validate(&self) -> crate::Result<()> {
        if self.daily_ad_limit == 0 {
            return Err(crate::Error::Config("daily_ad_limit must be positive".to_string()));
        }
        if self.conversion_unit == 0 {
            return Err(crate::Error::Config("conversion_unit must be positive".to_string()));
        }
        if self.ad_reward_min == 0 || self.ad_reward_min > self.ad_reward_max {
            return Err(crate::Error::Config(format!(
                "invalid ad reward range {}..={}",
                self.ad_reward_min, self.ad_reward_max
            )));
        }
        Ok(())
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Bounded mailbox capacity (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl LedgerConfig {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LedgerConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.rules.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from a variable lookup, starting from the defaults
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        let mut config = LedgerConfig::default();

        if let Some(data_dir) = var("REWARD_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Some(store) = var("REWARD_LEDGER_STORE") {
            config.store = store.parse()?;
        }

        if let Some(capacity) = var("REWARD_LEDGER_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid mailbox capacity {}: {}", capacity, e))
            })?;
        }

        Ok(config)
    }
}
