//! Leveling & progression engine
//!
//! Features:
//! - XP grants from named sources with stacked multipliers
//! - Exponential level curve with multi-level carry-over
//! - Rank bands, daily login streak with day-indexed bonuses
//! - Bounded XP ledger, persisted through a [`StateStore`]

pub mod curve;
pub mod ledger;
pub mod multipliers;
pub mod ranks;
pub mod sources;

pub use curve::LevelCurve;
pub use ledger::{XpGrant, XpLedger};
pub use multipliers::{Multiplier, MultiplierKind, MultiplierSet};
pub use ranks::RankBand;
pub use sources::XpSource;

use anyhow::Result;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::db::{LEVEL_DATA_BACKUP_KEY, LEVEL_DATA_KEY, StateStore};
use crate::error::ProgressionError;
use crate::workouts::PERFECT_WORKOUT_MINUTES;
use multipliers::{DayPart, day_part, is_weekend, streak_bonus, time_of_day_bonus, weekend_bonus};
use sources::{MAX_DAILY_BONUS_DAY, daily_bonus_key, find_source};

/// Grants shown by `xp_history`
pub const RECENT_HISTORY: usize = 20;

/// A claimed day-indexed login bonus of the current streak
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyBonus {
    pub day: u32,
    pub xp: u64,
    pub claimed: bool,
    pub date: NaiveDate,
}

/// Persisted progression state (`levelData` blob)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressionState {
    #[serde(rename = "currentLevel", default = "first_level")]
    pub level: u32,
    #[serde(rename = "currentXP", default)]
    pub current_xp: u64,
    #[serde(rename = "totalXP", default)]
    pub total_xp: u64,
    #[serde(rename = "dailyLoginStreak", default)]
    pub daily_login_streak: u32,
    #[serde(rename = "lastLoginDate", default, deserialize_with = "empty_date_as_none")]
    pub last_login_date: Option<NaiveDate>,
    #[serde(rename = "xpHistory", default)]
    pub xp_history: XpLedger,
    #[serde(rename = "dailyBonuses", default)]
    pub daily_bonuses: Vec<DailyBonus>,
    #[serde(rename = "activeMultipliers", default)]
    pub active_multipliers: MultiplierSet,
}

fn first_level() -> u32 {
    1
}

/// Older blobs store a missing login date as `""`
fn empty_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            level: 1,
            current_xp: 0,
            total_xp: 0,
            daily_login_streak: 0,
            last_login_date: None,
            xp_history: XpLedger::new(),
            daily_bonuses: Vec::new(),
            active_multipliers: MultiplierSet::new(),
        }
    }
}

/// What a single grant did, for the presentation layer to render
#[derive(Debug, Clone, PartialEq)]
pub struct GrantEvent {
    pub source_id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub base_amount: u64,
    pub multiplier: f64,
    pub amount: u64,
    pub level_before: u32,
    pub level_after: u32,
    /// Set when the grant moved the user into a new rank band
    pub new_rank: Option<&'static RankBand>,
    /// Set when the state could not be written; memory stays authoritative
    pub persist_error: Option<ProgressionError>,
}

impl GrantEvent {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }

    pub fn levels_gained(&self) -> u32 {
        self.level_after - self.level_before
    }
}

/// Sum of XP across several grant events
pub fn total_amount(events: &[GrantEvent]) -> u64 {
    events.iter().map(|e| e.amount).sum()
}

/// Outcome of the first login of a calendar day
#[derive(Debug, Clone, PartialEq)]
pub struct LoginReport {
    pub date: NaiveDate,
    pub streak: u32,
    /// A previous streak was broken by a gap
    pub streak_reset: bool,
    pub grants: Vec<GrantEvent>,
    pub persist_error: Option<ProgressionError>,
}

/// Snapshot for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelData {
    pub level: u32,
    #[serde(rename = "currentXP")]
    pub current_xp: u64,
    #[serde(rename = "requiredXP")]
    pub required_xp: u64,
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    pub rank: &'static str,
    pub rank_icon: &'static str,
    pub next_rank: &'static str,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialAction {
    Like,
    Comment,
    Share,
    Friend,
}

impl SocialAction {
    pub fn source_key(&self) -> &'static str {
        match self {
            SocialAction::Like => "LIKE_RECEIVED",
            SocialAction::Comment => "COMMENT_RECEIVED",
            SocialAction::Share => "WORKOUT_SHARED",
            SocialAction::Friend => "FRIEND_ADDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(SocialAction::Like),
            "comment" => Some(SocialAction::Comment),
            "share" => Some(SocialAction::Share),
            "friend" => Some(SocialAction::Friend),
            _ => None,
        }
    }
}

/// Achievement rarity; scales the XP of an unlock
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    /// Multiplier applied to ACHIEVEMENT_UNLOCK
    pub fn xp_scale(&self) -> f64 {
        match self {
            Rarity::Common => 1.0,
            Rarity::Rare => 2.0,
            Rarity::Epic => 4.0,
            Rarity::Legendary => 10.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rarity::Common => "обычное",
            Rarity::Rare => "редкое",
            Rarity::Epic => "эпическое",
            Rarity::Legendary => "легендарное",
        }
    }
}

/// Single-writer progression state machine
pub struct ProgressionEngine<S: StateStore> {
    config: EngineConfig,
    state: ProgressionState,
    store: S,
}

impl<S: StateStore> ProgressionEngine<S> {
    /// Load state from the store, starting fresh when nothing (or garbage) is saved
    pub fn open(mut store: S, config: EngineConfig) -> Result<Self> {
        let state = match store.load_blob(LEVEL_DATA_KEY)? {
            Some(json) => match serde_json::from_str::<ProgressionState>(&json) {
                Ok(mut state) => {
                    state.level = state.level.max(1);
                    state.xp_history.trim(config.ledger_retention);
                    state
                }
                Err(e) => {
                    warn!("Unreadable {} blob ({}), moving it to {}", LEVEL_DATA_KEY, e, LEVEL_DATA_BACKUP_KEY);
                    if let Err(e) = store.save_blob(LEVEL_DATA_BACKUP_KEY, &json) {
                        warn!("Could not back up {}: {:#}", LEVEL_DATA_KEY, e);
                    }
                    ProgressionState::default()
                }
            },
            None => ProgressionState::default(),
        };

        debug!("Loaded progression: level {}, {} XP total", state.level, state.total_xp);
        Ok(Self { config, state, store })
    }

    /// Engine over an explicit state (nothing is read from the store)
    pub fn with_state(store: S, config: EngineConfig, state: ProgressionState) -> Self {
        Self { config, state, store }
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give the store back, e.g. to reopen it with another config
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn required_xp(&self, level: u32) -> u64 {
        self.config.curve.required_xp(level)
    }

    /// Write the state blob
    pub fn persist(&mut self) -> Result<(), ProgressionError> {
        let json = serde_json::to_string(&self.state)
            .map_err(|e| ProgressionError::PersistenceFailed(e.to_string()))?;
        self.store.save_blob(LEVEL_DATA_KEY, &json).map_err(|e| {
            let err = ProgressionError::persistence(&e);
            warn!("{}", err);
            err
        })
    }

    /// Product of every multiplier that applies to a grant made at `now`
    pub fn total_multiplier(&mut self, custom_multiplier: f64, now: DateTime<FixedOffset>) -> f64 {
        let mut total = custom_multiplier;
        total *= self.state.active_multipliers.active_factor(now);
        total *= streak_bonus(self.state.daily_login_streak);
        total *= weekend_bonus(now.weekday());
        total *= time_of_day_bonus(now.hour());
        total
    }

    /// Apply an XP grant from `source_key`.
    ///
    /// Unknown keys and non-finite or negative multipliers grant nothing.
    /// A failed write is reported in the event, the grant itself stands.
    pub fn grant_xp(
        &mut self,
        source_key: &str,
        custom_multiplier: f64,
        now: DateTime<FixedOffset>,
    ) -> Result<GrantEvent, ProgressionError> {
        if !custom_multiplier.is_finite() || custom_multiplier < 0.0 {
            warn!("Ignoring grant from {} with multiplier {}", source_key, custom_multiplier);
            return Err(ProgressionError::InvalidMultiplier(custom_multiplier));
        }
        let Some(source) = find_source(source_key) else {
            warn!("Ignoring grant from unknown XP source {}", source_key);
            return Err(ProgressionError::UnknownXpSource(source_key.to_string()));
        };

        // Stacked boosts can overflow; a non-finite factor would not survive the JSON blob
        let multiplier = self.total_multiplier(custom_multiplier, now);
        if !multiplier.is_finite() {
            warn!("Ignoring grant from {}: combined multiplier {} is not finite", source.id, multiplier);
            return Err(ProgressionError::InvalidMultiplier(multiplier));
        }
        let amount = (source.base as f64 * multiplier).floor().max(0.0) as u64;

        self.state.xp_history.record(
            XpGrant {
                source_id: source.id.to_string(),
                name: source.name.to_string(),
                icon: source.icon.to_string(),
                base_amount: source.base,
                multiplier,
                amount,
                timestamp: now,
            },
            self.config.ledger_retention,
        );

        let level_before = self.state.level;
        let rank_before = ranks::rank_for(level_before);

        self.state.current_xp = self.state.current_xp.saturating_add(amount);
        self.state.total_xp = self.state.total_xp.saturating_add(amount);

        loop {
            let required = self.required_xp(self.state.level);
            if self.state.current_xp < required {
                break;
            }
            self.state.current_xp -= required;
            self.state.level += 1;
        }

        let level_after = self.state.level;
        let rank_after = ranks::rank_for(level_after);
        if level_after > level_before {
            info!("Level up: {} -> {} ({} {})", level_before, level_after, rank_after.icon, rank_after.name);
        }
        debug!("+{} XP from {} (x{:.2})", amount, source.id, multiplier);

        let persist_error = self.persist().err();

        Ok(GrantEvent {
            source_id: source.id,
            name: source.name,
            icon: source.icon,
            base_amount: source.base,
            multiplier,
            amount,
            level_before,
            level_after,
            new_rank: (rank_after != rank_before).then_some(rank_after),
            persist_error,
        })
    }

    /// Once-per-day login check. `None` when today was already counted.
    pub fn check_daily_login(&mut self, now: DateTime<FixedOffset>) -> Option<LoginReport> {
        let today = now.date_naive();
        let last = self.state.last_login_date;

        if last == Some(today) {
            return None;
        }

        let streak_reset = match last {
            Some(last) if today.pred_opt() == Some(last) => {
                self.state.daily_login_streak += 1;
                false
            }
            Some(_) => {
                self.state.daily_login_streak = 1;
                self.state.daily_bonuses.clear();
                true
            }
            None => {
                self.state.daily_login_streak = 1;
                false
            }
        };
        self.state.last_login_date = Some(today);
        let streak = self.state.daily_login_streak;

        info!("Daily login on {}: streak {}", today, streak);

        let mut grants = Vec::new();
        if let Ok(event) = self.grant_xp("DAILY_LOGIN", 1.0, now) {
            grants.push(event);
        }

        if streak <= MAX_DAILY_BONUS_DAY
            && let Ok(event) = self.grant_xp(&daily_bonus_key(streak), 1.0, now)
        {
            self.state.daily_bonuses.push(DailyBonus {
                day: streak,
                xp: event.amount,
                claimed: true,
                date: today,
            });
            grants.push(event);
        }

        let persist_error = self.persist().err();

        Some(LoginReport {
            date: today,
            streak,
            streak_reset,
            grants,
            persist_error,
        })
    }

    /// Add a temporary (or permanent, with `None`) multiplier
    pub fn add_multiplier(
        &mut self,
        kind: MultiplierKind,
        factor: f64,
        duration_minutes: Option<u32>,
        description: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<(), ProgressionError> {
        if !factor.is_finite() || factor <= 0.0 {
            warn!("Rejecting multiplier {} with factor {}", description, factor);
            return Err(ProgressionError::InvalidMultiplier(factor));
        }

        self.state
            .active_multipliers
            .add(kind, factor, duration_minutes, description, now);
        info!("Multiplier x{} ({}) added for {:?} min", factor, description, duration_minutes);
        self.persist()
    }

    pub fn active_multipliers(&mut self, now: DateTime<FixedOffset>) -> &[Multiplier] {
        self.state.active_multipliers.active(now)
    }

    pub fn level_data(&self) -> LevelData {
        let level = self.state.level;
        let required_xp = self.required_xp(level);
        let rank = ranks::rank_for(level);
        let next = ranks::next_rank(level);

        LevelData {
            level,
            current_xp: self.state.current_xp,
            required_xp,
            total_xp: self.state.total_xp,
            rank: rank.name,
            rank_icon: rank.icon,
            next_rank: next.name,
            progress_percentage: self.state.current_xp as f64 / required_xp as f64 * 100.0,
        }
    }

    /// Most recent grants, oldest first
    pub fn xp_history(&self) -> Vec<&XpGrant> {
        self.state.xp_history.recent(RECENT_HISTORY)
    }

    pub fn ledger(&self) -> &XpLedger {
        &self.state.xp_history
    }

    pub fn daily_streak(&self) -> u32 {
        self.state.daily_login_streak
    }

    /// Grants for a finished workout: base, long-session, time-of-day and weekend bonuses
    pub fn on_workout_complete(&mut self, duration_minutes: u32, now: DateTime<FixedOffset>) -> Vec<GrantEvent> {
        let mut keys: Vec<(&str, f64)> = vec![("WORKOUT_COMPLETE", 1.0)];

        if duration_minutes >= PERFECT_WORKOUT_MINUTES {
            keys.push(("PERFECT_WORKOUT", 0.5));
        }
        match day_part(now.hour()) {
            DayPart::Morning => keys.push(("MORNING_WORKOUT", 1.0)),
            DayPart::Evening => keys.push(("EVENING_WORKOUT", 1.0)),
            DayPart::Other => {}
        }
        if is_weekend(now.weekday()) {
            keys.push(("WEEKEND_WARRIOR", 1.0));
        }

        keys.into_iter()
            .filter_map(|(key, multiplier)| self.grant_xp(key, multiplier, now).ok())
            .collect()
    }

    pub fn on_challenge_complete(&mut self, position: u32, now: DateTime<FixedOffset>) -> Result<GrantEvent, ProgressionError> {
        let key = if position == 1 { "CHALLENGE_WIN" } else { "CHALLENGE_PARTICIPATION" };
        self.grant_xp(key, 1.0, now)
    }

    pub fn on_social_interaction(&mut self, action: SocialAction, now: DateTime<FixedOffset>) -> Result<GrantEvent, ProgressionError> {
        self.grant_xp(action.source_key(), 1.0, now)
    }

    pub fn on_achievement_unlocked(&mut self, rarity: Rarity, now: DateTime<FixedOffset>) -> Result<GrantEvent, ProgressionError> {
        self.grant_xp("ACHIEVEMENT_UNLOCK", rarity.xp_scale(), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::{Duration, TimeZone};

    /// 2026-10-19 is a Monday, 2026-10-24 a Saturday
    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, day, hour, 0, 0)
            .unwrap()
    }

    fn weekday_noon() -> DateTime<FixedOffset> {
        at(20, 12)
    }

    fn engine() -> ProgressionEngine<MemoryStore> {
        ProgressionEngine::open(MemoryStore::new(), EngineConfig::default()).unwrap()
    }

    fn engine_with(state: ProgressionState) -> ProgressionEngine<MemoryStore> {
        ProgressionEngine::with_state(MemoryStore::new(), EngineConfig::default(), state)
    }

    fn assert_invariant(engine: &ProgressionEngine<MemoryStore>) {
        let state = engine.state();
        assert!(state.level >= 1);
        assert!(state.current_xp < engine.required_xp(state.level));
    }

    #[test]
    fn test_plain_workout_grant() {
        let mut engine = engine();
        let event = engine.grant_xp("WORKOUT_COMPLETE", 1.0, weekday_noon()).unwrap();

        assert_eq!(event.amount, 50);
        assert_eq!(event.multiplier, 1.0);
        assert!(!event.leveled_up());
        assert_eq!(engine.state().current_xp, 50);
        assert_eq!(engine.state().level, 1);
        assert_eq!(engine.state().total_xp, 50);
    }

    #[test]
    fn test_saturday_morning_long_streak() {
        let mut engine = engine_with(ProgressionState {
            daily_login_streak: 7,
            ..ProgressionState::default()
        });
        let event = engine.grant_xp("WORKOUT_COMPLETE", 1.0, at(24, 6)).unwrap();

        assert!((event.multiplier - 2.34).abs() < 1e-9);
        assert_eq!(event.amount, 117);
        assert_eq!(event.level_before, 1);
        assert_eq!(event.level_after, 2);
        assert_eq!(engine.state().level, 2);
        assert_eq!(engine.state().current_xp, 17);
        assert_eq!(engine.state().total_xp, 117);
    }

    #[test]
    fn test_grant_crossing_two_levels() {
        let mut engine = engine();
        // 100 (level 1) + 150 (level 2) + 5 carried over
        let event = engine.grant_xp("LIKE_RECEIVED", 51.0, weekday_noon()).unwrap();

        assert_eq!(event.amount, 255);
        assert_eq!(event.levels_gained(), 2);
        assert_eq!(engine.state().level, 3);
        assert_eq!(engine.state().current_xp, 5);
        assert_invariant(&engine);
    }

    #[test]
    fn test_unknown_source_grants_nothing() {
        let mut engine = engine();
        let err = engine.grant_xp("NOPE", 1.0, weekday_noon()).unwrap_err();

        assert_eq!(err, ProgressionError::UnknownXpSource("NOPE".to_string()));
        assert_eq!(engine.state().total_xp, 0);
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_total_xp_is_sum_of_grants() {
        let mut engine = engine();
        let keys = ["WORKOUT_COMPLETE", "LIKE_RECEIVED", "CHALLENGE_WIN", "LEGENDARY_ACHIEVEMENT", "DAILY_LOGIN"];
        let mut sum = 0;
        for (i, key) in keys.iter().cycle().take(40).enumerate() {
            let now = at(19 + (i as u32 % 7), (i as u32 * 5) % 24);
            let before = engine.state().total_xp;
            let event = engine.grant_xp(key, 1.0 + (i % 3) as f64 * 0.25, now).unwrap();
            assert_eq!(engine.state().total_xp, before + event.amount);
            sum += event.amount;
            assert_invariant(&engine);
        }
        assert_eq!(engine.state().total_xp, sum);
    }

    #[test]
    fn test_multiplier_stacks_with_bonuses() {
        let mut engine = engine();
        engine
            .add_multiplier(MultiplierKind::Event, 2.0, Some(60), "x2 event", weekday_noon())
            .unwrap();

        let event = engine.grant_xp("WORKOUT_COMPLETE", 1.5, weekday_noon()).unwrap();
        assert_eq!(event.amount, 150);
    }

    #[test]
    fn test_expired_multiplier_ignored() {
        let mut engine = engine();
        engine
            .add_multiplier(MultiplierKind::Weekend, 1.5, Some(60), "weekend", weekday_noon())
            .unwrap();

        let later = weekday_noon() + Duration::minutes(61);
        let event = engine.grant_xp("WORKOUT_COMPLETE", 1.0, later).unwrap();
        assert_eq!(event.amount, 50);
        assert!(engine.active_multipliers(later).is_empty());
    }

    #[test]
    fn test_invalid_multiplier_rejected() {
        let mut engine = engine();
        let now = weekday_noon();
        assert_eq!(
            engine.add_multiplier(MultiplierKind::Event, 0.0, None, "zero", now),
            Err(ProgressionError::InvalidMultiplier(0.0))
        );
        assert!(engine.add_multiplier(MultiplierKind::Event, f64::NAN, None, "nan", now).is_err());
        assert!(engine.active_multipliers(now).is_empty());
    }

    #[test]
    fn test_non_finite_custom_multiplier_rejected() {
        let mut engine = engine();
        engine.grant_xp("CHALLENGE_WIN", 1.0, weekday_noon()).unwrap();
        let before = engine.state().clone();

        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            assert!(matches!(
                engine.grant_xp("LIKE_RECEIVED", bad, weekday_noon()),
                Err(ProgressionError::InvalidMultiplier(_))
            ));
        }
        assert_eq!(engine.state(), &before);

        let reopened = ProgressionEngine::open(engine.into_store(), EngineConfig::default()).unwrap();
        assert_eq!(reopened.state().total_xp, 150);
    }

    #[test]
    fn test_overflowing_boosts_rejected() {
        let mut engine = engine();
        let now = weekday_noon();
        engine.grant_xp("CHALLENGE_WIN", 1.0, now).unwrap();
        engine.add_multiplier(MultiplierKind::Event, 1e200, None, "a", now).unwrap();
        engine.add_multiplier(MultiplierKind::Event, 1e200, None, "b", now).unwrap();

        assert!(matches!(
            engine.grant_xp("LIKE_RECEIVED", 1.0, now),
            Err(ProgressionError::InvalidMultiplier(m)) if m.is_infinite()
        ));
        assert_eq!(engine.state().total_xp, 150);
        assert_eq!(engine.ledger().len(), 1);

        let reopened = ProgressionEngine::open(engine.into_store(), EngineConfig::default()).unwrap();
        assert_eq!(reopened.state().total_xp, 150);
    }

    #[test]
    fn test_ledger_keeps_most_recent_hundred() {
        let mut engine = engine();
        for i in 0..105 {
            let now = weekday_noon() + Duration::seconds(i);
            engine.grant_xp("LIKE_RECEIVED", 1.0, now).unwrap();
        }

        let ledger = engine.ledger();
        assert_eq!(ledger.len(), 100);
        let first = ledger.iter().next().unwrap();
        assert_eq!(first.timestamp, weekday_noon() + Duration::seconds(5));
        assert_eq!(ledger.last().unwrap().timestamp, weekday_noon() + Duration::seconds(104));
        assert_eq!(engine.xp_history().len(), RECENT_HISTORY);
    }

    #[test]
    fn test_first_daily_login() {
        let mut engine = engine();
        let report = engine.check_daily_login(weekday_noon()).unwrap();

        assert_eq!(report.streak, 1);
        assert!(!report.streak_reset);
        // DAILY_LOGIN 10 + DAILY_BONUS_1 10
        assert_eq!(total_amount(&report.grants), 20);
        assert_eq!(engine.state().daily_bonuses.len(), 1);
        assert_eq!(engine.state().last_login_date, Some(weekday_noon().date_naive()));
    }

    #[test]
    fn test_daily_login_idempotent_same_day() {
        let mut engine = engine();
        engine.check_daily_login(at(20, 9)).unwrap();
        let streak = engine.daily_streak();
        let total = engine.state().total_xp;

        assert!(engine.check_daily_login(at(20, 18)).is_none());
        assert_eq!(engine.daily_streak(), streak);
        assert_eq!(engine.state().total_xp, total);
    }

    #[test]
    fn test_daily_login_consecutive_days() {
        let mut engine = engine();
        engine.check_daily_login(at(20, 12)).unwrap();
        let report = engine.check_daily_login(at(21, 12)).unwrap();

        assert_eq!(report.streak, 2);
        assert_eq!(report.grants[1].source_id, "DAILY_BONUS_2");
        assert_eq!(engine.state().daily_bonuses.len(), 2);
    }

    #[test]
    fn test_daily_login_gap_resets_streak() {
        let mut engine = engine();
        engine.check_daily_login(at(19, 12)).unwrap();
        engine.check_daily_login(at(20, 12)).unwrap();
        let report = engine.check_daily_login(at(22, 12)).unwrap();

        assert_eq!(report.streak, 1);
        assert!(report.streak_reset);
        assert_eq!(engine.state().daily_bonuses.len(), 1);
        assert_eq!(engine.state().daily_bonuses[0].day, 1);
    }

    #[test]
    fn test_future_last_login_resets_streak() {
        let today = at(20, 12);
        let mut engine = engine_with(ProgressionState {
            daily_login_streak: 5,
            last_login_date: Some(today.date_naive() + Duration::days(3)),
            daily_bonuses: (1..=5)
                .map(|day| DailyBonus {
                    day,
                    xp: 10,
                    claimed: true,
                    date: today.date_naive(),
                })
                .collect(),
            ..ProgressionState::default()
        });
        let report = engine.check_daily_login(today).unwrap();

        assert_eq!(report.streak, 1);
        assert!(report.streak_reset);
        assert_eq!(engine.state().daily_bonuses.len(), 1);
        assert_eq!(engine.state().daily_bonuses[0].day, 1);
        assert_eq!(engine.state().last_login_date, Some(today.date_naive()));
    }

    #[test]
    fn test_no_daily_bonus_after_day_seven() {
        let mut engine = engine_with(ProgressionState {
            daily_login_streak: 7,
            last_login_date: Some(at(19, 12).date_naive()),
            ..ProgressionState::default()
        });
        let report = engine.check_daily_login(at(20, 12)).unwrap();

        assert_eq!(report.streak, 8);
        assert_eq!(report.grants.len(), 1);
        assert_eq!(report.grants[0].source_id, "DAILY_LOGIN");
    }

    #[test]
    fn test_level_data_snapshot() {
        let mut engine = engine();
        engine.grant_xp("WORKOUT_COMPLETE", 1.0, weekday_noon()).unwrap();
        let data = engine.level_data();

        assert_eq!(data.level, 1);
        assert_eq!(data.current_xp, 50);
        assert_eq!(data.required_xp, 100);
        assert_eq!(data.rank, "Новичок");
        assert_eq!(data.rank_icon, "🌱");
        assert_eq!(data.next_rank, "Ученик");
        assert!((data.progress_percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_new_rank_reported() {
        let mut engine = engine_with(ProgressionState {
            level: 4,
            current_xp: 330,
            ..ProgressionState::default()
        });
        let event = engine.grant_xp("EXERCISE_COMPLETE", 2.0, weekday_noon()).unwrap();

        assert_eq!(event.level_after, 5);
        assert_eq!(event.new_rank.map(|r| r.name), Some("Ученик"));
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let mut engine = ProgressionEngine::open(MemoryStore::failing(), EngineConfig::default()).unwrap();
        let event = engine.grant_xp("WORKOUT_COMPLETE", 1.0, weekday_noon()).unwrap();

        assert!(matches!(event.persist_error, Some(ProgressionError::PersistenceFailed(_))));
        assert_eq!(engine.state().total_xp, 50);

        // Next successful write reconciles
        engine.store_mut().fail_writes = false;
        let event = engine.grant_xp("WORKOUT_COMPLETE", 1.0, weekday_noon()).unwrap();
        assert!(event.persist_error.is_none());
        let saved = engine.store().load_blob(LEVEL_DATA_KEY).unwrap().unwrap();
        let state: ProgressionState = serde_json::from_str(&saved).unwrap();
        assert_eq!(state.total_xp, 100);
    }

    #[test]
    fn test_state_survives_reopen() {
        let mut engine = engine();
        engine.check_daily_login(weekday_noon()).unwrap();
        engine.grant_xp("CHALLENGE_WIN", 1.0, weekday_noon()).unwrap();
        let before = engine.state().clone();

        let reopened = ProgressionEngine::open(engine.into_store(), EngineConfig::default()).unwrap();
        assert_eq!(reopened.state(), &before);
    }

    #[test]
    fn test_persisted_blob_layout() {
        let mut engine = engine();
        engine.grant_xp("WORKOUT_COMPLETE", 1.0, weekday_noon()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&engine.store().load_blob(LEVEL_DATA_KEY).unwrap().unwrap()).unwrap();

        for field in [
            "currentLevel",
            "currentXP",
            "totalXP",
            "dailyLoginStreak",
            "lastLoginDate",
            "xpHistory",
            "dailyBonuses",
            "activeMultipliers",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["xpHistory"][0]["sourceId"], "WORKOUT_COMPLETE");
    }

    #[test]
    fn test_legacy_blob_with_empty_date() {
        let json = r#"{"currentLevel":3,"currentXP":40,"totalXP":290,"dailyLoginStreak":2,"lastLoginDate":""}"#;
        let state: ProgressionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.level, 3);
        assert_eq!(state.last_login_date, None);
        assert!(state.xp_history.is_empty());
    }

    #[test]
    fn test_unreadable_blob_starts_fresh() {
        let mut store = MemoryStore::new();
        store.save_blob(LEVEL_DATA_KEY, "not json").unwrap();
        let engine = ProgressionEngine::open(store, EngineConfig::default()).unwrap();
        assert_eq!(engine.state(), &ProgressionState::default());
        assert_eq!(
            engine.store().load_blob(LEVEL_DATA_BACKUP_KEY).unwrap().as_deref(),
            Some("not json")
        );
    }

    #[test]
    fn test_on_workout_complete_long_morning_weekend() {
        let mut engine = engine();
        // Saturday 07:00: every grant gets x1.5 (weekend) x1.3 (morning)
        let events = engine.on_workout_complete(45, at(24, 7));
        let ids: Vec<&str> = events.iter().map(|e| e.source_id).collect();

        assert_eq!(ids, vec!["WORKOUT_COMPLETE", "PERFECT_WORKOUT", "MORNING_WORKOUT", "WEEKEND_WARRIOR"]);
        assert_eq!(events[0].amount, 97);
        assert_eq!(events[1].amount, 97);
    }

    #[test]
    fn test_on_workout_complete_short_weekday() {
        let mut engine = engine();
        let events = engine.on_workout_complete(20, weekday_noon());
        assert_eq!(events.len(), 1);
        assert_eq!(total_amount(&events), 50);
    }

    #[test]
    fn test_challenge_and_social_sources() {
        let mut engine = engine();
        let now = weekday_noon();
        assert_eq!(engine.on_challenge_complete(1, now).unwrap().source_id, "CHALLENGE_WIN");
        assert_eq!(engine.on_challenge_complete(3, now).unwrap().source_id, "CHALLENGE_PARTICIPATION");
        assert_eq!(engine.on_social_interaction(SocialAction::Friend, now).unwrap().amount, 20);
        assert_eq!(engine.on_social_interaction(SocialAction::Share, now).unwrap().amount, 15);
    }

    #[test]
    fn test_achievement_unlock_scales_with_rarity() {
        let mut engine = engine();
        let now = weekday_noon();
        assert_eq!(engine.on_achievement_unlocked(Rarity::Common, now).unwrap().amount, 50);
        assert_eq!(engine.on_achievement_unlocked(Rarity::Legendary, now).unwrap().amount, 500);
    }
}
