//! Contains common, primitive types shared across the engine.
//!
//! This module defines the small identifier and tag types used by the
//! components and the public event and error types.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Uniquely and safely identifies a registered change observer.
    ///
    /// Returned by `ProgressionEngine::on_change` and used to unregister the
    /// observer later. Keys are never reused, so a stale id cannot remove a
    /// newer observer.
    pub struct ObserverId;
}

/// The balances a caller can run short of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceKind {
    Hearts,
    Xp,
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hearts => f.write_str("hearts"),
            Self::Xp => f.write_str("XP"),
        }
    }
}

/// Identifies one of the two day-streak counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreakKind {
    /// Consecutive days the app was opened.
    Login,
    /// Consecutive days the daily quiz was completed.
    Quiz,
}

impl StreakKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Login => "login streak",
            Self::Quiz => "quiz streak",
        }
    }
}
