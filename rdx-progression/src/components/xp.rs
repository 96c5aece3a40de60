//! The XP balance and the time-boxed multiplier boost.

use crate::common::BalanceKind;
use crate::error::{ProgressionError, Result};
use crate::time::Timestamp;
use chrono::Duration;

/// XP credited per base point while a boost is active.
pub const BOOST_MULTIPLIER: u64 = 2;

/// Owns the XP balance and the boost expiry.
///
/// The boost has no active flag of its own. Whether it applies is decided by
/// comparing the stored expiry against the caller's `now` on every read, so an
/// expiry that passed while the app was closed needs no cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XpLedger {
    balance: u64,
    boost_expires_at: Option<Timestamp>,
}

impl XpLedger {
    pub fn new(balance: u64, boost_expires_at: Option<Timestamp>) -> Self {
        Self {
            balance,
            boost_expires_at,
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn boost_expires_at(&self) -> Option<Timestamp> {
        self.boost_expires_at
    }

    pub fn is_boost_active(&self, now: Timestamp) -> bool {
        self.boost_expires_at.is_some_and(|expires| now < expires)
    }

    /// Remaining boost time, or `None` when no boost applies.
    pub fn boost_remaining(&self, now: Timestamp) -> Option<Duration> {
        self.boost_expires_at
            .filter(|expires| now < *expires)
            .map(|expires| expires - now)
    }

    /// The amount `award(base, now)` would credit.
    pub fn credit_for(&self, base: u64, now: Timestamp) -> u64 {
        if self.is_boost_active(now) {
            base.saturating_mul(BOOST_MULTIPLIER)
        } else {
            base
        }
    }

    /// Credits `base`, multiplied while boosted. Returns the amount credited.
    pub fn award(&mut self, base: u64, now: Timestamp) -> u64 {
        let credited = self.credit_for(base, now);
        self.balance = self.balance.saturating_add(credited);
        credited
    }

    /// Debits `amount` if the balance covers it. Returns the new balance.
    pub fn spend(&mut self, amount: u64) -> Result<u64> {
        self.ensure_funds(amount)?;
        self.balance -= amount;
        Ok(self.balance)
    }

    /// Fails without side effects unless the balance covers `amount`.
    pub fn ensure_funds(&self, amount: u64) -> Result<()> {
        if self.balance < amount {
            return Err(ProgressionError::InsufficientBalance {
                kind: BalanceKind::Xp,
                needed: amount,
                available: self.balance,
            });
        }
        Ok(())
    }

    /// Fails without side effects if a boost is already running.
    pub fn ensure_boost_inactive(&self, now: Timestamp) -> Result<()> {
        match self.boost_expires_at {
            Some(expires_at) if now < expires_at => {
                Err(ProgressionError::AlreadyActive { expires_at })
            }
            _ => Ok(()),
        }
    }

    /// Starts a boost lasting `duration` from `now`. Returns the expiry.
    pub fn activate_boost(&mut self, duration: Duration, now: Timestamp) -> Result<Timestamp> {
        self.ensure_boost_inactive(now)?;
        let expires_at = match now.checked_add_signed(duration) {
            Some(expires_at) if duration > Duration::zero() => expires_at,
            _ => return Err(ProgressionError::InvalidDuration { duration }),
        };
        self.boost_expires_at = Some(expires_at);
        Ok(expires_at)
    }
}
