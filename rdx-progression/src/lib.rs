//! # Progression
//!
//! An offline-aware player progression engine for Rust.
//!
//! Progression tracks the state a lesson-based learning app keeps about its
//! player: a pool of hearts that regenerates over real time (including while
//! the app is closed), an XP balance with a time-boxed multiplier, and
//! day-based streaks for logins and daily quizzes. All of it lives in one
//! persisted record with one save/load lifecycle.
//!
//! ## Core Concepts
//!
//! - **Reconcile**: Every time-based rule is a pure function of a `now` handed
//!   in by a `ClockSource`. Hearts that came due while the app was closed are
//!   credited from a single stored anchor, and calling reconcile twice with
//!   the same `now` changes nothing.
//! - **Single Owner**: The `ProgressionEngine` owns the record and is the only
//!   thing that reads or writes it. Hosts construct it explicitly, call
//!   `load()` at startup, `tick()` on their own cadence, and `save()` on
//!   suspend.
//! - **Event-Driven UI**: After every change the engine publishes a
//!   `ProgressionEvent` on a broadcast channel and to registered observers.
//! - **Configuration-Driven**: Capacity, regeneration speed, prices and quiz
//!   rewards come from a `ProgressionConfig`, usually loaded from a TOML file.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use progression::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     // 1. Load configuration and open the backing store.
//!     let config = ProgressionConfig::load(None)?;
//!     let store = FileStore::open(&config.store_path)?;
//!
//!     // 2. Create the engine and load the saved record.
//!     let mut engine = ProgressionEngine::new(config, store, Arc::new(SystemClock));
//!     let report = engine.load();
//!     println!("Regenerated {} hearts while away.", report.hearts_regenerated);
//!
//!     // 3. Drive it from the app.
//!     engine.spend_heart(1)?;
//!     engine.award_xp(10)?;
//!     println!("{} hearts, {} XP", engine.hearts_remaining(), engine.xp_balance());
//!
//!     // 4. Save on suspend or quit.
//!     engine.save()?;
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Progression Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


// Declare all the modules in the crate.
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod record;
pub mod store;
pub mod time;

/// A prelude module for easy importing of the most common Progression types.
pub mod prelude {
    pub use crate::common::{BalanceKind, ObserverId, StreakKind};
    pub use crate::components::{HeartSpend, StreakTransition};
    pub use crate::config::ProgressionConfig;
    pub use crate::engine::{DailyQuizReward, LoadReport, ProgressionEngine};
    pub use crate::error::ProgressionError;
    pub use crate::events::{ProgressionEvent, RecordSource};
    pub use crate::record::ProgressionRecord;
    pub use crate::store::{FileStore, MemoryStore, StateStore};
    pub use crate::time::{ClockSource, ManualClock, SystemClock, Timestamp};
}
