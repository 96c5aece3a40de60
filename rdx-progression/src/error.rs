//! Error types reported to callers of the engine.
//!
//! None of these are fatal. Every operation that returns one of them has left
//! the progression record exactly as it was before the call.

use crate::common::BalanceKind;
use crate::time::Timestamp;
use chrono::{Duration, NaiveDate};
use thiserror::Error;

/// Errors returned by `ProgressionEngine` operations.
#[derive(Debug, Error)]
pub enum ProgressionError {
    /// A mutation was issued before `load()` finished reconciling the record.
    #[error("progression state has not been loaded yet")]
    NotLoaded,

    /// Not enough XP or hearts to cover a spend.
    #[error("insufficient {kind}: needed {needed}, available {available}")]
    InsufficientBalance {
        kind: BalanceKind,
        needed: u64,
        available: u64,
    },

    /// The daily quiz was already completed on this calendar day.
    #[error("daily quiz already completed on {date}")]
    AlreadyCompleted { date: NaiveDate },

    /// An XP boost is running; boosts never stack.
    #[error("XP boost already active until {expires_at}")]
    AlreadyActive { expires_at: Timestamp },

    /// A boost duration that is not positive or runs past the representable
    /// range of timestamps.
    #[error("invalid duration: {duration}")]
    InvalidDuration { duration: Duration },

    /// A player name that is empty once trimmed.
    #[error("player name must not be empty")]
    EmptyName,

    /// Hearts are at capacity so nothing can be added.
    #[error("hearts already full ({max})")]
    HeartsFull { max: u32 },

    /// The record could not be written to the backing store.
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

pub type Result<T, E = ProgressionError> = std::result::Result<T, E>;
