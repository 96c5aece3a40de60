//! The engine that owns the progression record and orchestrates its components.

use crate::common::{ObserverId, StreakKind};
use crate::components::{
    DayStreak, HeartRegen, HeartSpend, StreakTracker, StreakTransition, XpLedger,
};
use crate::config::ProgressionConfig;
use crate::error::{ProgressionError, Result};
use crate::events::{ProgressionEvent, RecordSource};
use crate::record::{ProgressionRecord, DEFAULT_PLAYER_NAME};
use crate::store::StateStore;
use crate::time::{ClockSource, Timestamp};
use anyhow::Context;
use chrono::Duration;
use slotmap::SlotMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

/// A callback invoked synchronously with every published event.
pub type Observer = Box<dyn FnMut(&ProgressionEvent) + Send>;

/// What `load()` found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub source: RecordSource,
    /// Hearts credited for time that passed while the app was closed.
    pub hearts_regenerated: u32,
    pub login: StreakTransition,
}

/// What a daily quiz completion paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyQuizReward {
    pub streak: u32,
    pub transition: StreakTransition,
    /// Total XP credited, boost and streak bonus included.
    pub xp_awarded: u64,
    pub hearts_awarded: u32,
}

/// The progression engine.
///
/// This struct is the single owner of the player's progression record and the
/// only component with save/load authority. It composes the heart, XP and
/// streak components over one persisted record, reconciles them against the
/// injected clock, and publishes a `ProgressionEvent` after every change.
///
/// The engine assumes a single writer: mutations take `&mut self` and there
/// is no internal locking. Hosts that share it across threads wrap it in a
/// mutex. Mutations issued before `load()` are rejected with
/// `ProgressionError::NotLoaded`.
pub struct ProgressionEngine {
    config: Arc<ProgressionConfig>,
    clock: Arc<dyn ClockSource>,
    store: Box<dyn StateStore>,
    hearts: HeartRegen,
    xp: XpLedger,
    streaks: StreakTracker,
    highest_lesson_unlocked: u32,
    player_name: String,
    loaded: bool,
    dirty: bool,
    boost_seen_active: bool,
    event_sender: broadcast::Sender<ProgressionEvent>,
    observers: SlotMap<ObserverId, Observer>,
}

// Core implementation block for internal logic.
impl ProgressionEngine {
    /// Creates an engine over `store`. Nothing is read until `load()`.
    pub fn new(
        config: ProgressionConfig,
        store: impl StateStore + 'static,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        const CHANNEL_CAPACITY: usize = 64;
        let (event_sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            hearts: HeartRegen::new(config.max_hearts, config.regen_interval()),
            config: Arc::new(config),
            clock,
            store: Box::new(store),
            xp: XpLedger::default(),
            streaks: StreakTracker::default(),
            highest_lesson_unlocked: 1,
            player_name: DEFAULT_PLAYER_NAME.to_string(),
            loaded: false,
            dirty: false,
            boost_seen_active: false,
            event_sender,
            observers: SlotMap::with_key(),
        }
    }

    #[doc(hidden)]
    fn apply_record(&mut self, record: ProgressionRecord) {
        self.hearts = HeartRegen::restore(
            record.hearts,
            record.max_hearts,
            self.config.regen_interval(),
            record.next_heart_ready_at,
        );
        self.xp = XpLedger::new(record.xp, record.xp_boost_expires_at);
        self.streaks = StreakTracker::new(
            DayStreak::new(
                record.login_streak,
                record.best_login_streak,
                record.last_login_date,
            ),
            DayStreak::new(
                record.quiz_streak,
                record.best_quiz_streak,
                record.last_quiz_date,
            ),
        );
        self.highest_lesson_unlocked = record.highest_lesson_unlocked.max(1);
        self.player_name = record.player_name;
    }

    #[doc(hidden)]
    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(ProgressionError::NotLoaded)
        }
    }

    /// Rejects unloaded state, then brings hearts up to date so a heart
    /// operation never acts on a stale count.
    #[doc(hidden)]
    fn begin_hearts(&mut self) -> Result<Timestamp> {
        self.ensure_loaded()?;
        let now = self.clock.now();
        let regenerated = self.hearts.reconcile(now);
        if regenerated > 0 {
            trace!(regenerated, "Hearts regenerated before mutation.");
            self.dirty = true;
            self.publish_hearts();
        }
        Ok(now)
    }

    #[doc(hidden)]
    fn hearts_at(&self, now: Timestamp) -> HeartRegen {
        let mut view = self.hearts.clone();
        view.reconcile(now);
        view
    }

    #[doc(hidden)]
    fn publish(&mut self, event: ProgressionEvent) {
        trace!(?event, "Publishing progression event.");
        for (_id, observer) in self.observers.iter_mut() {
            observer(&event);
        }
        self.event_sender.send(event).ok();
    }

    #[doc(hidden)]
    fn publish_hearts(&mut self) {
        self.publish(ProgressionEvent::HeartsChanged {
            hearts: self.hearts.current(),
            max_hearts: self.hearts.max(),
            next_heart_ready_at: self.hearts.next_ready_at(),
        });
    }

    #[doc(hidden)]
    fn publish_xp(&mut self) {
        self.publish(ProgressionEvent::XpChanged {
            balance: self.xp.balance(),
        });
    }

    #[doc(hidden)]
    fn publish_streak(&mut self, kind: StreakKind) {
        let streak = *self.streaks.get(kind);
        self.publish(ProgressionEvent::StreakChanged {
            kind,
            current: streak.current(),
            best: streak.best(),
        });
    }

    /// Saves after a mutation. A failed write is logged and retried by the
    /// next save; the in-memory state stays authoritative.
    #[doc(hidden)]
    fn autosave(&mut self) {
        self.dirty = true;
        if let Err(err) = self.save() {
            error!(error = ?err, "Autosave failed; the record will be written on the next save.");
        }
    }
}

// Public API implementation block.
impl ProgressionEngine {
    /// Reads the persisted record and reconciles it against the clock.
    ///
    /// A missing or unusable record is replaced by defaults and reported in
    /// the returned `LoadReport`; loading never fails. Hearts that came due
    /// while the app was closed are credited and today's login is counted
    /// before this returns.
    pub fn load(&mut self) -> LoadReport {
        let now = self.clock.now();
        let max_hearts = self.config.max_hearts;
        let key = self.config.record_key();

        let (mut record, source) = match self.store.get(&key) {
            None => {
                info!(key = %key, "No stored progression record; starting fresh.");
                (ProgressionRecord::new(max_hearts), RecordSource::Fresh)
            }
            Some(raw) => match ProgressionRecord::decode(&raw) {
                Ok(record) => (record, RecordSource::Stored),
                Err(err) => {
                    warn!(key = %key, %err, "Stored progression record is unusable; starting fresh.");
                    (
                        ProgressionRecord::new(max_hearts),
                        RecordSource::Recovered {
                            reason: err.to_string(),
                        },
                    )
                }
            },
        };
        if record.normalize(max_hearts) {
            debug!("Stored progression record was normalized.");
        }

        self.apply_record(record);
        self.loaded = true;

        let hearts_regenerated = self.hearts.reconcile(now);
        let login = self.streaks.record_login(now);
        self.boost_seen_active = self.xp.is_boost_active(now);

        info!(
            hearts = self.hearts.current(),
            hearts_regenerated,
            xp = self.xp.balance(),
            login_streak = self.streaks.login().current(),
            "Progression loaded."
        );

        self.autosave();
        self.publish(ProgressionEvent::Loaded {
            source: source.clone(),
        });
        self.publish_hearts();
        self.publish_xp();
        if login.changed() {
            self.publish_streak(StreakKind::Login);
        }

        LoadReport {
            source,
            hearts_regenerated,
            login,
        }
    }

    /// Serializes the full record and writes it through the store.
    pub fn save(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let encoded = self
            .record()
            .encode()
            .context("Failed to encode progression record")?;
        self.store.set(&self.config.record_key(), encoded);
        self.store
            .flush()
            .context("Failed to flush progression record")?;
        self.dirty = false;
        debug!("Progression record saved.");
        Ok(())
    }

    /// Overwrites the record with defaults and saves it.
    pub fn reset(&mut self) -> Result<()> {
        warn!("Resetting progression record to defaults.");
        self.apply_record(ProgressionRecord::new(self.config.max_hearts));
        self.loaded = true;
        self.boost_seen_active = false;
        self.dirty = true;
        self.save()?;
        self.publish(ProgressionEvent::RecordReset);
        self.publish_hearts();
        self.publish_xp();
        Ok(())
    }

    /// Periodic host poll. Credits due hearts and notices lapsed boosts.
    /// Returns the number of hearts regenerated.
    pub fn tick(&mut self) -> Result<u32> {
        self.ensure_loaded()?;
        let now = self.clock.now();

        let regenerated = self.hearts.reconcile(now);
        if regenerated > 0 {
            debug!(regenerated, hearts = self.hearts.current(), "Hearts regenerated.");
            self.publish_hearts();
            self.autosave();
        }

        if self.boost_seen_active && !self.xp.is_boost_active(now) {
            info!("XP boost expired.");
            self.boost_seen_active = false;
            self.publish(ProgressionEvent::BoostExpired);
        }
        Ok(regenerated)
    }

    /// Takes `n` hearts, flooring at zero. Publishes `OutOfHearts` when the
    /// last one goes. Spending zero is a no-op.
    pub fn spend_heart(&mut self, n: u32) -> Result<HeartSpend> {
        let now = self.begin_hearts()?;
        let spend = self.hearts.spend(n, now)?;
        if spend.spent == 0 {
            return Ok(spend);
        }
        debug!(spent = spend.spent, remaining = spend.remaining, "Hearts spent.");

        self.publish_hearts();
        if spend.out_of_hearts {
            info!("Out of hearts.");
            self.publish(ProgressionEvent::OutOfHearts);
        }
        self.autosave();
        Ok(spend)
    }

    /// Adds `n` hearts, clamped to capacity. Returns how many were added.
    pub fn grant_hearts(&mut self, n: u32) -> Result<u32> {
        let now = self.begin_hearts()?;
        let added = self.hearts.grant(n, now);
        if added > 0 {
            self.publish_hearts();
            self.autosave();
        }
        Ok(added)
    }

    /// Raises hearts to `to`, or to capacity when `None`. Returns how many
    /// were added.
    pub fn refill_hearts(&mut self, to: Option<u32>) -> Result<u32> {
        let now = self.begin_hearts()?;
        let target = to.unwrap_or(self.hearts.max());
        let added = self.hearts.refill_to(target, now);
        if added > 0 {
            self.publish_hearts();
            self.autosave();
        }
        Ok(added)
    }

    pub fn hearts_remaining(&self) -> u32 {
        self.hearts_at(self.clock.now()).current()
    }

    pub fn max_hearts(&self) -> u32 {
        self.hearts.max()
    }

    pub fn has_hearts(&self) -> bool {
        self.hearts_remaining() > 0
    }

    /// Zero when hearts are full.
    pub fn time_until_next_heart(&self) -> Duration {
        let now = self.clock.now();
        self.hearts_at(now).time_until_next(now)
    }

    /// Credits `base` XP, doubled while a boost is active. Returns the amount
    /// credited.
    pub fn award_xp(&mut self, base: u64) -> Result<u64> {
        self.ensure_loaded()?;
        let now = self.clock.now();
        let credited = self.xp.award(base, now);
        if credited != base {
            debug!(base, credited, "XP boost applied.");
        }
        if credited > 0 {
            self.publish_xp();
            self.autosave();
        }
        Ok(credited)
    }

    /// Debits `amount` XP. Returns the remaining balance.
    pub fn spend_xp(&mut self, amount: u64) -> Result<u64> {
        self.ensure_loaded()?;
        let balance = self.xp.spend(amount)?;
        if amount > 0 {
            self.publish_xp();
            self.autosave();
        }
        Ok(balance)
    }

    pub fn xp_balance(&self) -> u64 {
        self.xp.balance()
    }

    /// Starts an XP boost. Fails if one is already running.
    pub fn activate_xp_boost(&mut self, duration: Duration) -> Result<Timestamp> {
        self.ensure_loaded()?;
        let now = self.clock.now();
        let expires_at = self.xp.activate_boost(duration, now)?;
        info!(%expires_at, "XP boost activated.");
        self.boost_seen_active = true;
        self.publish(ProgressionEvent::BoostActivated { expires_at });
        self.autosave();
        Ok(expires_at)
    }

    pub fn is_xp_boost_active(&self) -> bool {
        self.xp.is_boost_active(self.clock.now())
    }

    pub fn xp_boost_remaining(&self) -> Option<Duration> {
        self.xp.boost_remaining(self.clock.now())
    }

    /// Buys one heart with XP at the configured price.
    ///
    /// Checks capacity and funds before touching either balance, so a refused
    /// purchase changes nothing. Returns the new heart count.
    pub fn buy_heart(&mut self) -> Result<u32> {
        let now = self.begin_hearts()?;
        if self.hearts.is_full() {
            return Err(ProgressionError::HeartsFull {
                max: self.hearts.max(),
            });
        }
        let price = self.config.economy.heart_price_xp;
        self.xp.spend(price)?;
        self.hearts.grant(1, now);
        info!(price, hearts = self.hearts.current(), "Bought a heart.");

        self.publish_xp();
        self.publish_hearts();
        self.autosave();
        Ok(self.hearts.current())
    }

    /// Buys an XP boost at the configured price and duration.
    pub fn buy_xp_boost(&mut self) -> Result<Timestamp> {
        self.ensure_loaded()?;
        let now = self.clock.now();
        let economy = &self.config.economy;
        let (price, duration) = (economy.boost_price_xp, economy.boost_duration());

        self.xp.ensure_boost_inactive(now)?;
        self.xp.ensure_funds(price)?;
        let expires_at = self.xp.activate_boost(duration, now)?;
        self.xp.spend(price)?;
        info!(price, %expires_at, "Bought an XP boost.");

        self.boost_seen_active = true;
        self.publish_xp();
        self.publish(ProgressionEvent::BoostActivated { expires_at });
        self.autosave();
        Ok(expires_at)
    }

    /// Counts today's login. Repeated calls on the same day change nothing.
    pub fn record_login_if_new_day(&mut self) -> Result<StreakTransition> {
        self.ensure_loaded()?;
        let transition = self.streaks.record_login(self.clock.now());
        if transition.changed() {
            info!(
                streak = self.streaks.login().current(),
                "Login streak updated."
            );
            self.publish_streak(StreakKind::Login);
            self.autosave();
        }
        Ok(transition)
    }

    /// Records today's daily quiz and pays its rewards.
    ///
    /// A second completion on the same calendar day returns
    /// `AlreadyCompleted` and grants nothing.
    pub fn record_daily_quiz_completion(&mut self) -> Result<DailyQuizReward> {
        let now = self.begin_hearts()?;
        let transition = self.streaks.record_quiz(now)?;
        let streak = self.streaks.quiz().current();

        let config = Arc::clone(&self.config);
        let rewards = &config.daily_quiz;
        let lands_on = |every: u32| every > 0 && streak % every == 0;

        let mut xp_awarded = self.xp.award(rewards.xp_reward, now);
        if lands_on(rewards.bonus_xp_every) {
            xp_awarded += self.xp.award(rewards.bonus_xp, now);
        }
        let hearts_awarded = if lands_on(rewards.bonus_heart_every) {
            self.hearts.grant(1, now)
        } else {
            0
        };
        info!(streak, xp_awarded, hearts_awarded, "Daily quiz completed.");

        self.publish_streak(StreakKind::Quiz);
        self.publish_xp();
        if hearts_awarded > 0 {
            self.publish_hearts();
        }
        self.autosave();

        Ok(DailyQuizReward {
            streak,
            transition,
            xp_awarded,
            hearts_awarded,
        })
    }

    pub fn is_daily_quiz_available(&self) -> bool {
        self.streaks.quiz_available(self.clock.now())
    }

    pub fn current_login_streak(&self) -> u32 {
        self.streaks.login().current()
    }

    pub fn best_login_streak(&self) -> u32 {
        self.streaks.login().best()
    }

    pub fn current_quiz_streak(&self) -> u32 {
        self.streaks.quiz().current()
    }

    pub fn best_quiz_streak(&self) -> u32 {
        self.streaks.quiz().best()
    }

    /// Raises the highest unlocked lesson to `lesson_id`. Returns `true` if
    /// it moved.
    pub fn unlock_lesson_if_higher(&mut self, lesson_id: u32) -> Result<bool> {
        self.ensure_loaded()?;
        if lesson_id <= self.highest_lesson_unlocked {
            return Ok(false);
        }
        self.highest_lesson_unlocked = lesson_id;
        info!(highest = lesson_id, "Lesson unlocked.");
        self.publish(ProgressionEvent::LessonUnlocked { highest: lesson_id });
        self.autosave();
        Ok(true)
    }

    /// Marks `lesson_id` finished, which opens the lesson after it.
    pub fn complete_lesson(&mut self, lesson_id: u32) -> Result<bool> {
        self.unlock_lesson_if_higher(lesson_id.saturating_add(1))
    }

    pub fn highest_unlocked_lesson(&self) -> u32 {
        self.highest_lesson_unlocked
    }

    pub fn is_lesson_unlocked(&self, lesson_id: u32) -> bool {
        lesson_id <= self.highest_lesson_unlocked
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Renames the player. Surrounding whitespace is trimmed and a blank name
    /// is refused. Returns `true` if the name changed.
    pub fn set_player_name(&mut self, name: &str) -> Result<bool> {
        self.ensure_loaded()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ProgressionError::EmptyName);
        }
        if name == self.player_name {
            return Ok(false);
        }
        self.player_name = name.to_string();
        info!(player = name, "Player renamed.");
        self.publish(ProgressionEvent::NameChanged {
            name: self.player_name.clone(),
        });
        self.autosave();
        Ok(true)
    }

    /// A snapshot of the record as it would be saved right now.
    pub fn record(&self) -> ProgressionRecord {
        let (login, quiz) = (self.streaks.login(), self.streaks.quiz());
        ProgressionRecord {
            hearts: self.hearts.current(),
            max_hearts: self.hearts.max(),
            next_heart_ready_at: self.hearts.next_ready_at(),
            xp: self.xp.balance(),
            xp_boost_expires_at: self.xp.boost_expires_at(),
            login_streak: login.current(),
            best_login_streak: login.best(),
            last_login_date: login.last_date(),
            quiz_streak: quiz.current(),
            best_quiz_streak: quiz.best(),
            last_quiz_date: quiz.last_date(),
            highest_lesson_unlocked: self.highest_lesson_unlocked,
            player_name: self.player_name.clone(),
        }
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// `true` when in-memory state has changes the store has not accepted.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Gives the store back, e.g. to reopen it with a fresh engine.
    pub fn into_store(self) -> Box<dyn StateStore> {
        self.store
    }

    /// Subscribes to the `ProgressionEvent` stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressionEvent> {
        self.event_sender.subscribe()
    }

    /// Registers a callback run synchronously for every event.
    pub fn on_change(
        &mut self,
        observer: impl FnMut(&ProgressionEvent) + Send + 'static,
    ) -> ObserverId {
        self.observers.insert(Box::new(observer))
    }

    /// Removes an observer. Returns `true` if it was registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::time::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// A store whose flush fails while `failing` is set.
    struct FlakyStore {
        inner: MemoryStore,
        failing: Arc<AtomicBool>,
    }

    impl StateStore for FlakyStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: String) {
            self.inner.set(key, value);
        }

        fn remove(&mut self, key: &str) -> Option<String> {
            self.inner.remove(key)
        }

        fn flush(&mut self) -> anyhow::Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("disk full");
            }
            self.inner.flush()
        }
    }

    fn engine_at(start: Timestamp) -> (ProgressionEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(start));
        let engine = ProgressionEngine::new(
            ProgressionConfig::default(),
            MemoryStore::new(),
            clock.clone(),
        );
        (engine, clock)
    }

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn mutations_before_load_are_rejected() {
        let (mut engine, _clock) = engine_at(t0());
        assert!(matches!(engine.spend_heart(1), Err(ProgressionError::NotLoaded)));
        assert!(matches!(engine.award_xp(10), Err(ProgressionError::NotLoaded)));
        assert!(matches!(engine.save(), Err(ProgressionError::NotLoaded)));
        assert_eq!(engine.xp_balance(), 0);
    }

    #[test]
    fn observers_see_every_change_until_removed() {
        let (mut engine, _clock) = engine_at(t0());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = engine.on_change(move |event| sink.lock().unwrap().push(event.clone()));

        engine.load();
        engine.award_xp(15).unwrap();
        assert!(seen
            .lock()
            .unwrap()
            .contains(&ProgressionEvent::XpChanged { balance: 15 }));

        assert!(engine.remove_observer(id));
        let before = seen.lock().unwrap().len();
        engine.award_xp(1).unwrap();
        assert_eq!(seen.lock().unwrap().len(), before);
    }

    #[test]
    fn last_heart_publishes_out_of_hearts() {
        let (mut engine, _clock) = engine_at(t0());
        engine.load();
        let mut events = engine.subscribe();

        let spend = engine.spend_heart(10).unwrap();
        assert!(spend.out_of_hearts);

        let mut saw_out = false;
        while let Ok(event) = events.try_recv() {
            saw_out |= event == ProgressionEvent::OutOfHearts;
        }
        assert!(saw_out);
        assert!(!engine.has_hearts());
    }

    #[test]
    fn reads_reflect_regeneration_between_ticks() {
        let (mut engine, clock) = engine_at(t0());
        engine.load();
        engine.spend_heart(3).unwrap();

        clock.advance(Duration::seconds(600));
        assert_eq!(engine.hearts_remaining(), 9);
        assert_eq!(engine.record().hearts, 7);

        assert_eq!(engine.tick().unwrap(), 2);
        assert_eq!(engine.record().hearts, 9);
        assert_eq!(engine.time_until_next_heart(), Duration::seconds(300));
    }

    #[test]
    fn failed_autosave_keeps_changes_pending_until_a_save_succeeds() {
        let failing = Arc::new(AtomicBool::new(false));
        let store = FlakyStore {
            inner: MemoryStore::new(),
            failing: Arc::clone(&failing),
        };
        let clock = Arc::new(ManualClock::starting_at(t0()));
        let mut engine = ProgressionEngine::new(ProgressionConfig::default(), store, clock);
        engine.load();
        assert!(!engine.has_unsaved_changes());

        failing.store(true, Ordering::SeqCst);
        assert_eq!(engine.award_xp(40).unwrap(), 40);
        assert!(engine.has_unsaved_changes());
        assert_eq!(engine.xp_balance(), 40);

        let err = engine.save().unwrap_err();
        assert!(matches!(err, ProgressionError::Persistence(_)));
        assert!(engine.has_unsaved_changes());

        failing.store(false, Ordering::SeqCst);
        engine.save().unwrap();
        assert!(!engine.has_unsaved_changes());
    }

    #[test]
    fn spending_nothing_publishes_nothing() {
        let (mut engine, _clock) = engine_at(t0());
        engine.load();
        engine.spend_heart(10).unwrap();
        let mut events = engine.subscribe();

        let spend = engine.spend_heart(0).unwrap();
        assert_eq!(spend.spent, 0);
        assert!(!spend.out_of_hearts);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn oversized_boost_is_refused_without_side_effects() {
        let (mut engine, _clock) = engine_at(t0());
        engine.load();
        let mut events = engine.subscribe();

        let err = engine.activate_xp_boost(Duration::MAX).unwrap_err();
        assert!(matches!(err, ProgressionError::InvalidDuration { .. }));
        assert!(!engine.is_xp_boost_active());
        assert_eq!(engine.record().xp_boost_expires_at, None);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn refused_boost_purchase_keeps_the_xp() {
        let mut config = ProgressionConfig::default();
        config.economy.boost_duration_secs = 0;
        let clock = Arc::new(ManualClock::starting_at(t0()));
        let mut engine = ProgressionEngine::new(config, MemoryStore::new(), clock);
        engine.load();
        engine.award_xp(2000).unwrap();

        let err = engine.buy_xp_boost().unwrap_err();
        assert!(matches!(err, ProgressionError::InvalidDuration { .. }));
        assert_eq!(engine.xp_balance(), 2000);
        assert!(!engine.is_xp_boost_active());
    }

    #[test]
    fn renaming_trims_and_announces() {
        let (mut engine, _clock) = engine_at(t0());
        assert!(matches!(
            engine.set_player_name("Ada"),
            Err(ProgressionError::NotLoaded)
        ));
        engine.load();
        assert_eq!(engine.player_name(), DEFAULT_PLAYER_NAME);
        let mut events = engine.subscribe();

        assert!(engine.set_player_name("  Ada ").unwrap());
        assert_eq!(engine.player_name(), "Ada");
        assert_eq!(
            events.try_recv().unwrap(),
            ProgressionEvent::NameChanged {
                name: "Ada".to_string()
            }
        );

        assert!(!engine.set_player_name("Ada").unwrap());
        assert!(matches!(
            engine.set_player_name(" \t"),
            Err(ProgressionError::EmptyName)
        ));
        assert_eq!(engine.record().player_name, "Ada");
    }

    #[test]
    fn boost_expiry_is_announced_once() {
        let (mut engine, clock) = engine_at(t0());
        engine.load();
        engine.activate_xp_boost(Duration::minutes(30)).unwrap();
        let mut events = engine.subscribe();

        clock.advance(Duration::minutes(31));
        engine.tick().unwrap();
        engine.tick().unwrap();

        let mut expired = 0;
        while let Ok(event) = events.try_recv() {
            if event == ProgressionEvent::BoostExpired {
                expired += 1;
            }
        }
        assert_eq!(expired, 1);
    }
}
