//! The three state owners the engine composes.
//!
//! Each component holds its slice of the progression record and applies its
//! rules against a `now` passed in by the caller. None of them read the clock,
//! touch storage, or publish events; that is the engine's job.

pub mod hearts;
pub mod streak;
pub mod xp;

pub use hearts::{HeartRegen, HeartSpend};
pub use streak::{DayStreak, StreakTracker, StreakTransition};
pub use xp::{XpLedger, BOOST_MULTIPLIER};
