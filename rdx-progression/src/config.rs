//! Defines all configuration structures for the progression engine.
//!
//! These structs are deserialized with `serde`, normally from a TOML file
//! layered under `PROGRESSION__*` environment variables by the `config` crate.
//! Every field has a default, so an empty or missing file yields the stock
//! economy.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for configured periods: a century, in seconds. Anything longer
/// cannot be added to a timestamp reliably.
pub const MAX_PERIOD_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// The top-level configuration for the `ProgressionEngine`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressionConfig {
    /// Heart capacity. Regeneration stops here.
    #[serde(default = "default_max_hearts")]
    pub max_hearts: u32,

    /// Seconds between two regenerated hearts.
    #[serde(default = "default_regen_interval_secs")]
    pub regen_interval_secs: u64,

    /// Key prefix for everything the engine writes into the shared store.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Where the file-backed store lives.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// How often a host should call `tick()`. The engine itself never sleeps;
    /// this is only a hint for host loops.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Prices for the XP store.
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Rewards for completing the daily quiz.
    #[serde(default)]
    pub daily_quiz: DailyQuizConfig,
}

/// Prices and durations for purchases made with XP.
#[derive(Debug, Clone, Deserialize)]
pub struct EconomyConfig {
    #[serde(default = "default_heart_price_xp")]
    pub heart_price_xp: u64,
    #[serde(default = "default_boost_price_xp")]
    pub boost_price_xp: u64,
    #[serde(default = "default_boost_duration_secs")]
    pub boost_duration_secs: u64,
}

/// Rewards granted by a successful daily quiz completion.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyQuizConfig {
    /// Base XP for finishing the quiz. Doubled while a boost is active.
    #[serde(default = "default_quiz_xp_reward")]
    pub xp_reward: u64,
    /// A bonus heart lands on every Nth day of the quiz streak. 0 disables it.
    #[serde(default = "default_bonus_heart_every")]
    pub bonus_heart_every: u32,
    /// Bonus XP lands on every Nth day of the quiz streak. 0 disables it.
    #[serde(default = "default_bonus_xp_every")]
    pub bonus_xp_every: u32,
    #[serde(default = "default_bonus_xp")]
    pub bonus_xp: u64,
}

impl ProgressionConfig {
    /// Loads configuration from an optional TOML file plus the environment.
    ///
    /// Environment variables use the `PROGRESSION` prefix and `__` as the
    /// nesting separator, e.g. `PROGRESSION__ECONOMY__HEART_PRICE_XP=50`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(config::Environment::with_prefix("PROGRESSION").separator("__"))
            .build()
            .context("Failed to read progression configuration")?
            .try_deserialize()
            .context("Failed to parse progression configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values the engine's invariants depend on.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_hearts > 0, "max_hearts must be greater than zero");
        ensure!(
            self.regen_interval_secs > 0,
            "regen_interval_secs must be greater than zero"
        );
        ensure!(
            self.regen_interval_secs <= MAX_PERIOD_SECS,
            "regen_interval_secs must be at most {MAX_PERIOD_SECS}"
        );
        ensure!(
            self.economy.boost_duration_secs > 0,
            "economy.boost_duration_secs must be greater than zero"
        );
        ensure!(
            self.economy.boost_duration_secs <= MAX_PERIOD_SECS,
            "economy.boost_duration_secs must be at most {MAX_PERIOD_SECS}"
        );
        ensure!(!self.namespace.is_empty(), "namespace must not be empty");
        Ok(())
    }

    /// Clamped to `MAX_PERIOD_SECS` for configs built without `validate()`.
    pub fn regen_interval(&self) -> chrono::Duration {
        period(self.regen_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// The store key holding the serialized record.
    pub fn record_key(&self) -> String {
        format!("{}.record", self.namespace)
    }
}

impl EconomyConfig {
    pub fn boost_duration(&self) -> chrono::Duration {
        period(self.boost_duration_secs)
    }
}

fn period(secs: u64) -> chrono::Duration {
    // MAX_PERIOD_SECS fits comfortably in both i64 and chrono's range.
    chrono::Duration::seconds(secs.min(MAX_PERIOD_SECS) as i64)
}

// --- Default value functions for serde ---

fn default_max_hearts() -> u32 {
    10
}

fn default_regen_interval_secs() -> u64 {
    300
}

fn default_namespace() -> String {
    "progression".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("progression.json")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_heart_price_xp() -> u64 {
    100
}

fn default_boost_price_xp() -> u64 {
    1000
}

fn default_boost_duration_secs() -> u64 {
    24 * 60 * 60
}

fn default_quiz_xp_reward() -> u64 {
    50
}

fn default_bonus_heart_every() -> u32 {
    3
}

fn default_bonus_xp_every() -> u32 {
    7
}

fn default_bonus_xp() -> u64 {
    100
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            max_hearts: default_max_hearts(),
            regen_interval_secs: default_regen_interval_secs(),
            namespace: default_namespace(),
            store_path: default_store_path(),
            poll_interval_ms: default_poll_interval_ms(),
            economy: EconomyConfig::default(),
            daily_quiz: DailyQuizConfig::default(),
        }
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            heart_price_xp: default_heart_price_xp(),
            boost_price_xp: default_boost_price_xp(),
            boost_duration_secs: default_boost_duration_secs(),
        }
    }
}

impl Default for DailyQuizConfig {
    fn default() -> Self {
        Self {
            xp_reward: default_quiz_xp_reward(),
            bonus_heart_every: default_bonus_heart_every(),
            bonus_xp_every: default_bonus_xp_every(),
            bonus_xp: default_bonus_xp(),
        }
    }
}
