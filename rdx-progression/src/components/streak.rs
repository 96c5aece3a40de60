//! Day-streak counters for logins and daily quizzes.

use crate::common::StreakKind;
use crate::error::{ProgressionError, Result};
use crate::time::{day_of, next_day, Timestamp};
use chrono::NaiveDate;
use tracing::warn;

/// What a reconciliation did to a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakTransition {
    /// Already counted today.
    Unchanged,
    /// Yesterday was counted, so the streak grew by one.
    Extended,
    /// No previous day, a missed day, or a date before the last one.
    Reset { previous: u32 },
}

impl StreakTransition {
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// One consecutive-day counter with its best-ever value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayStreak {
    current: u32,
    best: u32,
    last_date: Option<NaiveDate>,
}

impl DayStreak {
    pub fn new(current: u32, best: u32, last_date: Option<NaiveDate>) -> Self {
        Self {
            current,
            best: best.max(current),
            last_date,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn best(&self) -> u32 {
        self.best
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.last_date
    }

    pub fn counted_on(&self, day: NaiveDate) -> bool {
        self.last_date == Some(day)
    }

    /// Applies the streak rule for `today` and records it as the last day.
    pub fn record(&mut self, today: NaiveDate) -> StreakTransition {
        let transition = match self.last_date {
            Some(last) if last == today => StreakTransition::Unchanged,
            Some(last) if next_day(last) == Some(today) => {
                self.current = self.current.saturating_add(1);
                StreakTransition::Extended
            }
            previous_day => {
                if previous_day.is_some_and(|last| today < last) {
                    warn!(%today, last = ?previous_day, "Clock is behind the last counted day; resetting streak.");
                }
                let previous = self.current;
                self.current = 1;
                StreakTransition::Reset { previous }
            }
        };
        self.last_date = Some(today);
        self.best = self.best.max(self.current);
        transition
    }
}

/// The login and quiz counters. They share the rule but never each other's
/// state: opening the app never touches the quiz streak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakTracker {
    login: DayStreak,
    quiz: DayStreak,
}

impl StreakTracker {
    pub fn new(login: DayStreak, quiz: DayStreak) -> Self {
        Self { login, quiz }
    }

    pub fn get(&self, kind: StreakKind) -> &DayStreak {
        match kind {
            StreakKind::Login => &self.login,
            StreakKind::Quiz => &self.quiz,
        }
    }

    pub fn login(&self) -> &DayStreak {
        &self.login
    }

    pub fn quiz(&self) -> &DayStreak {
        &self.quiz
    }

    /// Counts today's app open. Safe to call any number of times per day.
    pub fn record_login(&mut self, now: Timestamp) -> StreakTransition {
        self.login.record(day_of(now))
    }

    /// Counts today's quiz, refusing a second completion on the same day.
    pub fn record_quiz(&mut self, now: Timestamp) -> Result<StreakTransition> {
        let today = day_of(now);
        if self.quiz.counted_on(today) {
            return Err(ProgressionError::AlreadyCompleted { date: today });
        }
        Ok(self.quiz.record(today))
    }

    pub fn quiz_available(&self, now: Timestamp) -> bool {
        !self.quiz.counted_on(day_of(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn consecutive_gap_and_same_day() {
        let mut streak = DayStreak::new(5, 5, Some(day(10)));

        assert_eq!(streak.record(day(11)), StreakTransition::Extended);
        assert_eq!(streak.current(), 6);

        assert_eq!(streak.record(day(13)), StreakTransition::Reset { previous: 6 });
        assert_eq!(streak.current(), 1);

        assert_eq!(streak.record(day(13)), StreakTransition::Unchanged);
        assert_eq!(streak.record(day(13)), StreakTransition::Unchanged);
        assert_eq!(streak.current(), 1);
        assert_eq!(streak.best(), 6);
    }

    #[test]
    fn first_day_starts_at_one() {
        let mut streak = DayStreak::default();
        assert_eq!(streak.record(day(1)), StreakTransition::Reset { previous: 0 });
        assert_eq!((streak.current(), streak.best()), (1, 1));
    }

    #[test]
    fn month_boundaries_count_as_consecutive() {
        let mut streak = DayStreak::new(3, 3, Some(day(31)));
        let feb_first = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(streak.record(feb_first), StreakTransition::Extended);
        assert_eq!(streak.current(), 4);
    }

    #[test]
    fn backward_clock_resets() {
        let mut streak = DayStreak::new(4, 4, Some(day(20)));
        assert_eq!(streak.record(day(19)), StreakTransition::Reset { previous: 4 });
        assert_eq!(streak.last_date(), Some(day(19)));
        assert_eq!(streak.best(), 4);
    }

    #[test]
    fn quiz_and_login_are_independent() {
        let morning = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 1, 10, 21, 0, 0).unwrap();
        let mut tracker = StreakTracker::default();

        tracker.record_login(morning);
        assert_eq!(tracker.login().current(), 1);
        assert_eq!(tracker.quiz().current(), 0);
        assert!(tracker.quiz_available(morning));

        tracker.record_quiz(morning).unwrap();
        let err = tracker.record_quiz(evening).unwrap_err();
        assert!(matches!(err, ProgressionError::AlreadyCompleted { date } if date == day(10)));
        assert!(!tracker.quiz_available(evening));
        assert_eq!(tracker.quiz().current(), 1);
    }
}
