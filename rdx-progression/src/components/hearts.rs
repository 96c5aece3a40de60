//! Heart regeneration, including catch-up for time spent offline.

use crate::common::BalanceKind;
use crate::error::{ProgressionError, Result};
use crate::time::{saturating_after, Timestamp};
use chrono::Duration;

/// Owns the heart count and the single timestamp regeneration is anchored on.
///
/// `next_ready_at` is `Some` exactly while the count is below capacity. All
/// catch-up is computed from that one anchor, so partial progress toward the
/// next heart carries across restarts exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartRegen {
    hearts: u32,
    max_hearts: u32,
    interval: Duration,
    next_ready_at: Option<Timestamp>,
}

/// The result of a successful spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartSpend {
    /// Hearts actually removed; less than requested when the count floors at 0.
    pub spent: u32,
    pub remaining: u32,
    pub out_of_hearts: bool,
}

impl HeartRegen {
    /// A full set of hearts with no timer running.
    pub fn new(max_hearts: u32, interval: Duration) -> Self {
        Self {
            hearts: max_hearts,
            max_hearts,
            interval,
            next_ready_at: None,
        }
    }

    /// Rebuilds the component from persisted fields, clamping the count to
    /// capacity and dropping a timer that a full count cannot have.
    pub fn restore(
        hearts: u32,
        max_hearts: u32,
        interval: Duration,
        next_ready_at: Option<Timestamp>,
    ) -> Self {
        let hearts = hearts.min(max_hearts);
        Self {
            hearts,
            max_hearts,
            interval,
            next_ready_at: if hearts < max_hearts { next_ready_at } else { None },
        }
    }

    pub fn current(&self) -> u32 {
        self.hearts
    }

    pub fn max(&self) -> u32 {
        self.max_hearts
    }

    pub fn next_ready_at(&self) -> Option<Timestamp> {
        self.next_ready_at
    }

    pub fn is_full(&self) -> bool {
        self.hearts >= self.max_hearts
    }

    /// Time left until the next heart. Zero when full or already due.
    pub fn time_until_next(&self, now: Timestamp) -> Duration {
        if self.is_full() {
            return Duration::zero();
        }
        match self.next_ready_at {
            Some(ready_at) => (ready_at - now).max(Duration::zero()),
            None => self.interval,
        }
    }

    /// Removes up to `amount` hearts, flooring at zero.
    ///
    /// Starts the regeneration timer if none is running. Spending from an
    /// empty pool is rejected and changes nothing, and so is a zero spend.
    pub fn spend(&mut self, amount: u32, now: Timestamp) -> Result<HeartSpend> {
        if amount == 0 {
            return Ok(HeartSpend {
                spent: 0,
                remaining: self.hearts,
                out_of_hearts: false,
            });
        }
        if self.hearts == 0 {
            return Err(ProgressionError::InsufficientBalance {
                kind: BalanceKind::Hearts,
                needed: u64::from(amount),
                available: 0,
            });
        }

        let spent = amount.min(self.hearts);
        self.hearts -= spent;
        if self.hearts < self.max_hearts && self.next_ready_at.is_none() {
            self.next_ready_at = Some(saturating_after(now, self.interval));
        }

        Ok(HeartSpend {
            spent,
            remaining: self.hearts,
            out_of_hearts: self.hearts == 0,
        })
    }

    /// Credits every heart that has come due by `now`. Returns how many were
    /// added.
    ///
    /// The new anchor keeps the original cadence: leftover time past the last
    /// regenerated heart counts toward the next one. Calling this again with
    /// the same `now` is a no-op.
    pub fn reconcile(&mut self, now: Timestamp) -> u32 {
        if self.is_full() {
            self.hearts = self.max_hearts;
            self.next_ready_at = None;
            return 0;
        }

        let Some(ready_at) = self.next_ready_at else {
            self.next_ready_at = Some(saturating_after(now, self.interval));
            return 0;
        };
        if now < ready_at {
            return 0;
        }

        let interval_ms = self.interval.num_milliseconds().max(1);
        let elapsed_ms = (now - ready_at).num_milliseconds();
        let due = 1 + (elapsed_ms / interval_ms) as u64;

        let before = self.hearts;
        self.hearts = (u64::from(self.hearts) + due).min(u64::from(self.max_hearts)) as u32;

        self.next_ready_at = if self.hearts < self.max_hearts {
            let remainder = elapsed_ms % interval_ms;
            Some(saturating_after(
                now,
                Duration::milliseconds(interval_ms - remainder),
            ))
        } else {
            None
        };

        self.hearts - before
    }

    /// Adds hearts from a purchase or reward, clamped to capacity. Returns how
    /// many were actually added.
    pub fn grant(&mut self, amount: u32, now: Timestamp) -> u32 {
        let before = self.hearts;
        self.hearts = self.hearts.saturating_add(amount).min(self.max_hearts);
        self.settle_timer(now);
        self.hearts - before
    }

    /// Raises the count to `target` (clamped to capacity). Never lowers it.
    pub fn refill_to(&mut self, target: u32, now: Timestamp) -> u32 {
        let target = target.min(self.max_hearts);
        let before = self.hearts;
        self.hearts = self.hearts.max(target);
        self.settle_timer(now);
        self.hearts - before
    }

    fn settle_timer(&mut self, now: Timestamp) {
        if self.is_full() {
            self.next_ready_at = None;
        } else if self.next_ready_at.is_none() {
            self.next_ready_at = Some(saturating_after(now, self.interval));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap()
    }

    fn secs(s: i64) -> Duration {
        Duration::seconds(s)
    }

    #[test]
    fn catch_up_keeps_the_original_cadence() {
        let anchor = t0();
        let mut hearts = HeartRegen::restore(5, 10, secs(300), Some(anchor));

        let added = hearts.reconcile(anchor + secs(1000));

        assert_eq!(added, 4);
        assert_eq!(hearts.current(), 9);
        assert_eq!(hearts.next_ready_at(), Some(anchor + secs(1200)));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let anchor = t0();
        let mut hearts = HeartRegen::restore(2, 10, secs(300), Some(anchor));
        let now = anchor + secs(750);

        hearts.reconcile(now);
        let after_first = hearts.clone();
        assert_eq!(hearts.reconcile(now), 0);
        assert_eq!(hearts, after_first);
    }

    #[test]
    fn poll_frequency_does_not_change_the_outcome() {
        let anchor = t0();
        let end = anchor + secs(3 * 300 + 123);

        let mut polled = HeartRegen::restore(1, 10, secs(300), Some(anchor));
        let mut now = anchor - secs(10);
        while now < end {
            now += secs(7);
            polled.reconcile(now.min(end));
        }

        let mut once = HeartRegen::restore(1, 10, secs(300), Some(anchor));
        once.reconcile(end);

        assert_eq!(polled, once);
        assert_eq!(once.current(), 5);
    }

    #[test]
    fn reaching_capacity_clears_the_timer() {
        let anchor = t0();
        let mut hearts = HeartRegen::restore(8, 10, secs(300), Some(anchor));

        assert_eq!(hearts.reconcile(anchor + secs(300)), 2);
        assert!(hearts.is_full());
        assert_eq!(hearts.next_ready_at(), None);
        assert_eq!(hearts.time_until_next(anchor + secs(300)), Duration::zero());
    }

    #[test]
    fn long_offline_gap_never_overfills() {
        let anchor = t0();
        let mut hearts = HeartRegen::restore(0, 10, secs(300), Some(anchor));

        hearts.reconcile(anchor + Duration::days(2));

        assert_eq!(hearts.current(), 10);
        assert_eq!(hearts.next_ready_at(), None);
    }

    #[test]
    fn spending_starts_the_timer_once() {
        let now = t0();
        let mut hearts = HeartRegen::new(10, secs(300));

        let spend = hearts.spend(1, now).unwrap();
        assert_eq!(spend.remaining, 9);
        assert_eq!(hearts.next_ready_at(), Some(now + secs(300)));

        hearts.spend(1, now + secs(100)).unwrap();
        assert_eq!(hearts.next_ready_at(), Some(now + secs(300)));
        assert_eq!(hearts.time_until_next(now + secs(100)), secs(200));
    }

    #[test]
    fn spending_floors_at_zero_and_then_refuses() {
        let now = t0();
        let mut hearts = HeartRegen::restore(2, 10, secs(300), Some(now));

        let spend = hearts.spend(5, now).unwrap();
        assert_eq!(spend.spent, 2);
        assert!(spend.out_of_hearts);

        let err = hearts.spend(1, now).unwrap_err();
        assert!(matches!(
            err,
            ProgressionError::InsufficientBalance {
                kind: BalanceKind::Hearts,
                ..
            }
        ));
        assert_eq!(hearts.current(), 0);
    }

    #[test]
    fn zero_spend_changes_nothing() {
        let now = t0();
        let mut hearts = HeartRegen::restore(0, 10, secs(300), Some(now));

        let spend = hearts.spend(0, now).unwrap();
        assert_eq!(spend.spent, 0);
        assert!(!spend.out_of_hearts);

        let mut full = HeartRegen::new(10, secs(300));
        full.spend(0, now).unwrap();
        assert_eq!(full.next_ready_at(), None);
    }

    #[test]
    fn timer_at_the_end_of_time_saturates() {
        let end = chrono::DateTime::<Utc>::MAX_UTC;
        let mut hearts = HeartRegen::new(10, secs(300));

        hearts.spend(1, end).unwrap();
        assert_eq!(hearts.next_ready_at(), Some(end));
        assert_eq!(hearts.reconcile(end), 1);
        assert!(hearts.is_full());
    }

    #[test]
    fn grant_keeps_a_running_anchor() {
        let anchor = t0();
        let mut hearts = HeartRegen::restore(3, 10, secs(300), Some(anchor));

        assert_eq!(hearts.grant(2, anchor - secs(50)), 2);
        assert_eq!(hearts.next_ready_at(), Some(anchor));

        assert_eq!(hearts.grant(50, anchor - secs(40)), 5);
        assert!(hearts.is_full());
        assert_eq!(hearts.next_ready_at(), None);
    }

    #[test]
    fn refill_only_raises() {
        let now = t0();
        let mut hearts = HeartRegen::restore(6, 10, secs(300), Some(now));

        assert_eq!(hearts.refill_to(3, now), 0);
        assert_eq!(hearts.current(), 6);
        assert_eq!(hearts.refill_to(99, now), 4);
        assert!(hearts.next_ready_at().is_none());
    }

    #[test]
    fn missing_timer_below_capacity_is_started() {
        let now = t0();
        let mut hearts = HeartRegen::restore(4, 10, secs(300), None);

        assert_eq!(hearts.reconcile(now), 0);
        assert_eq!(hearts.next_ready_at(), Some(now + secs(300)));
    }
}
