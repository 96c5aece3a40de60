//! The persisted progression record and its one canonical encoding.

use crate::time::Timestamp;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Everything the engine persists, as one aggregate.
///
/// There is no stored boost flag; activity is always derived from
/// `xp_boost_expires_at` against the current time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionRecord {
    pub hearts: u32,
    pub max_hearts: u32,
    #[serde(default)]
    pub next_heart_ready_at: Option<Timestamp>,
    pub xp: u64,
    #[serde(default)]
    pub xp_boost_expires_at: Option<Timestamp>,
    #[serde(default)]
    pub login_streak: u32,
    #[serde(default)]
    pub best_login_streak: u32,
    #[serde(default)]
    pub last_login_date: Option<NaiveDate>,
    #[serde(default)]
    pub quiz_streak: u32,
    #[serde(default)]
    pub best_quiz_streak: u32,
    #[serde(default)]
    pub last_quiz_date: Option<NaiveDate>,
    pub highest_lesson_unlocked: u32,
    #[serde(default = "default_player_name")]
    pub player_name: String,
}

/// The name a new player starts with.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

fn default_player_name() -> String {
    DEFAULT_PLAYER_NAME.to_string()
}

/// Why a stored record could not be used as-is.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("stored record is not valid JSON for this schema: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("stored record violates an invariant: {0}")]
    Invalid(String),
}

impl ProgressionRecord {
    /// A fresh record: full hearts, no XP, no streaks, first lesson open.
    pub fn new(max_hearts: u32) -> Self {
        Self {
            hearts: max_hearts,
            max_hearts,
            next_heart_ready_at: None,
            xp: 0,
            xp_boost_expires_at: None,
            login_streak: 0,
            best_login_streak: 0,
            last_login_date: None,
            quiz_streak: 0,
            best_quiz_streak: 0,
            last_quiz_date: None,
            highest_lesson_unlocked: 1,
            player_name: default_player_name(),
        }
    }

    pub fn encode(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a stored record and rejects ones that cannot be trusted.
    pub fn decode(raw: &str) -> Result<Self, RecordError> {
        let record: Self = serde_json::from_str(raw)?;
        if record.max_hearts == 0 {
            return Err(RecordError::Invalid("maxHearts is zero".into()));
        }
        if record.highest_lesson_unlocked == 0 {
            return Err(RecordError::Invalid("highestLessonUnlocked is zero".into()));
        }
        Ok(record)
    }

    /// Brings a decoded record in line with the configured capacity and the
    /// structural invariants. Returns `true` if anything had to change.
    ///
    /// A missing regeneration timer below capacity is left alone here; the
    /// heart component starts one on its first reconcile.
    pub fn normalize(&mut self, max_hearts: u32) -> bool {
        let before = self.clone();

        if self.max_hearts != max_hearts {
            warn!(
                stored = self.max_hearts,
                configured = max_hearts,
                "Heart capacity changed since the record was saved."
            );
            self.max_hearts = max_hearts;
        }
        self.hearts = self.hearts.min(self.max_hearts);
        if self.hearts == self.max_hearts {
            self.next_heart_ready_at = None;
        }
        self.best_login_streak = self.best_login_streak.max(self.login_streak);
        self.best_quiz_streak = self.best_quiz_streak.max(self.quiz_streak);
        if self.player_name.trim().is_empty() {
            self.player_name = default_player_name();
        }

        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn populated() -> ProgressionRecord {
        ProgressionRecord {
            hearts: 4,
            max_hearts: 10,
            next_heart_ready_at: Some(Utc.with_ymd_and_hms(2024, 1, 10, 8, 30, 15).unwrap()),
            xp: 1250,
            xp_boost_expires_at: Some(Utc.with_ymd_and_hms(2024, 1, 11, 8, 0, 0).unwrap()),
            login_streak: 5,
            best_login_streak: 9,
            last_login_date: NaiveDate::from_ymd_opt(2024, 1, 10),
            quiz_streak: 2,
            best_quiz_streak: 3,
            last_quiz_date: NaiveDate::from_ymd_opt(2024, 1, 9),
            highest_lesson_unlocked: 7,
            player_name: "Ada".to_string(),
        }
    }

    #[test]
    fn encoding_preserves_every_field() {
        let record = populated();
        let decoded = ProgressionRecord::decode(&record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);

        let fresh = ProgressionRecord::new(10);
        let decoded = ProgressionRecord::decode(&fresh.encode().unwrap()).unwrap();
        assert_eq!(decoded, fresh);
        assert!(decoded.next_heart_ready_at.is_none());
        assert!(decoded.last_login_date.is_none());
    }

    #[test]
    fn dates_use_iso_strings() {
        let encoded = populated().encode().unwrap();
        assert!(encoded.contains("\"lastLoginDate\":\"2024-01-10\""));
        assert!(encoded.contains("\"nextHeartReadyAt\":\"2024-01-10T08:30:15Z\""));
    }

    #[test]
    fn garbage_and_broken_invariants_are_rejected() {
        assert!(matches!(
            ProgressionRecord::decode("{not json"),
            Err(RecordError::Malformed(_))
        ));

        let mut record = populated();
        record.highest_lesson_unlocked = 0;
        let raw = record.encode().unwrap();
        assert!(matches!(
            ProgressionRecord::decode(&raw),
            Err(RecordError::Invalid(_))
        ));
    }

    #[test]
    fn normalize_clamps_to_configured_capacity() {
        let mut record = populated();
        record.hearts = 10;
        assert!(record.normalize(6));
        assert_eq!(record.max_hearts, 6);
        assert_eq!(record.hearts, 6);
        assert!(record.next_heart_ready_at.is_none());

        let mut record = populated();
        assert!(!record.normalize(10));
    }

    #[test]
    fn records_without_a_name_get_the_default() {
        let raw = r#"{"hearts":3,"maxHearts":10,"xp":0,"highestLessonUnlocked":1}"#;
        let record = ProgressionRecord::decode(raw).unwrap();
        assert_eq!(record.player_name, DEFAULT_PLAYER_NAME);

        let mut blank = populated();
        blank.player_name = "   ".to_string();
        assert!(blank.normalize(10));
        assert_eq!(blank.player_name, DEFAULT_PLAYER_NAME);
    }
}
