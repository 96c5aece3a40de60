//! Time sources and calendar helpers.
//!
//! Every time-based rule in the engine is evaluated against a `Timestamp`
//! handed in by a `ClockSource`. Nothing in the crate reads the system clock
//! directly, which keeps regeneration and streak logic deterministic under test.

use chrono::{DateTime, Days, NaiveDate, Utc};
use std::sync::RwLock;

/// A wall-clock instant. All persisted times use this one type.
pub type Timestamp = DateTime<Utc>;

/// Supplies the current wall-clock time to the engine.
pub trait ClockSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

impl<F> ClockSource for F
where
    F: Fn() -> Timestamp + Send + Sync,
{
    fn now(&self) -> Timestamp {
        self()
    }
}

/// Reads the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Used by tests and by the interactive shell to simulate time passing,
/// including long offline gaps.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<Timestamp>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Moves the clock forward (or backward, for a negative delta).
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = saturating_after(*now, delta);
    }

    /// Jumps the clock to an absolute time.
    pub fn set(&self, to: Timestamp) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// The calendar day a timestamp falls on. Days are always counted in UTC so
/// two samples from the same day agree regardless of the device's zone.
pub fn day_of(at: Timestamp) -> NaiveDate {
    at.date_naive()
}

/// The calendar day after `date`, or `None` at the end of chrono's range.
pub fn next_day(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(1))
}

/// `at + delta`, pinned to the edge of chrono's range instead of overflowing.
pub fn saturating_after(at: Timestamp, delta: chrono::Duration) -> Timestamp {
    at.checked_add_signed(delta).unwrap_or(if delta < chrono::Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Formats a remaining duration as `MM:SS`, or `HH:MM:SS` past the hour.
pub fn format_countdown(remaining: chrono::Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let start = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn closures_act_as_clocks() {
        let fixed = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let clock = move || fixed;
        assert_eq!(ClockSource::now(&clock), fixed);
    }

    #[test]
    fn day_boundaries_are_utc() {
        let late = Utc.with_ymd_and_hms(2024, 1, 10, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap();
        assert_eq!(next_day(day_of(late)), Some(day_of(early)));
    }

    #[test]
    fn far_jumps_pin_to_the_range_edge() {
        let start = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        assert_eq!(saturating_after(start, Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(saturating_after(start, Duration::MIN), DateTime::<Utc>::MIN_UTC);
        assert_eq!(saturating_after(start, Duration::hours(1)), start + Duration::hours(1));

        let clock = ManualClock::starting_at(start);
        clock.advance(Duration::MAX);
        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn countdown_formatting() {
        assert_eq!(format_countdown(Duration::seconds(200)), "03:20");
        assert_eq!(format_countdown(Duration::seconds(-5)), "00:00");
        assert_eq!(format_countdown(Duration::hours(23) + Duration::seconds(61)), "23:01:01");
    }
}
