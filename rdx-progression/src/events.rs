//! Defines all public event types published by the progression engine.
//!
//! UI and other collaborators subscribe to these to refresh their views. An
//! event is a notification only; the engine's state is already updated by the
//! time it is published.

use crate::common::StreakKind;
use crate::time::Timestamp;

/// Where the record in memory came from on the last `load()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSource {
    /// A valid record was read from the store.
    Stored,
    /// Nothing was stored yet; defaults were used.
    Fresh,
    /// A stored record could not be used; defaults replaced it.
    Recovered { reason: String },
}

/// A change to player progression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressionEvent {
    /// Fired once per `load()`, after reconciliation.
    Loaded { source: RecordSource },
    /// The heart count or the regeneration timer changed.
    HeartsChanged {
        hearts: u32,
        max_hearts: u32,
        next_heart_ready_at: Option<Timestamp>,
    },
    /// A spend took the last heart.
    OutOfHearts,
    /// The XP balance changed.
    XpChanged { balance: u64 },
    BoostActivated { expires_at: Timestamp },
    /// A tick observed that a previously active boost has lapsed.
    BoostExpired,
    StreakChanged {
        kind: StreakKind,
        current: u32,
        best: u32,
    },
    LessonUnlocked { highest: u32 },
    NameChanged { name: String },
    /// The record was overwritten with defaults.
    RecordReset,
}
