//! Tracker - owns the engine, achievement book and storage, routes app events

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::achievements::{AchievementBook, AchievementReport, SocialProgress};
use crate::config::EngineConfig;
use crate::db::{ACHIEVEMENTS_KEY, StateStore, USER_STATS_KEY, WorkoutLog};
use crate::error::ProgressionError;
use crate::level::{
    GrantEvent, LevelData, LoginReport, Multiplier, MultiplierKind, ProgressionEngine, SocialAction, XpGrant,
};
use crate::workouts::{ChartPeriod, UserStats, WorkoutSession, chart_data, worked_out_on};

/// Everything that happened when a workout was logged
#[derive(Debug, Clone)]
pub struct WorkoutReport {
    pub session_id: i64,
    pub grants: Vec<GrantEvent>,
    pub achievements: AchievementReport,
    pub stats: UserStats,
}

impl WorkoutReport {
    pub fn total_xp(&self) -> u64 {
        self.grants.iter().map(|g| g.amount).sum()
    }
}

/// Result of the app-start routine
#[derive(Debug, Clone)]
pub struct DayStart {
    pub login: Option<LoginReport>,
    pub achievements: AchievementReport,
    pub grants: Vec<GrantEvent>,
}

/// Portable dump of the workout history and stats
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportData {
    pub history: Vec<WorkoutSession>,
    pub stats: UserStats,
}

pub struct Tracker<S: StateStore + WorkoutLog> {
    engine: ProgressionEngine<S>,
    book: AchievementBook,
    stats: UserStats,
}

impl<S: StateStore + WorkoutLog> Tracker<S> {
    pub fn open(store: S, config: EngineConfig) -> Result<Self> {
        let book = load_blob_or_default(&store, ACHIEVEMENTS_KEY)?;
        let stats = load_blob_or_default(&store, USER_STATS_KEY)?;
        let engine = ProgressionEngine::open(store, config)?;
        Ok(Self { engine, book, stats })
    }

    pub fn engine(&self) -> &ProgressionEngine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ProgressionEngine<S> {
        &mut self.engine
    }

    pub fn into_store(self) -> S {
        self.engine.into_store()
    }

    pub fn achievements(&self) -> &AchievementBook {
        &self.book
    }

    pub fn stats(&self) -> &UserStats {
        &self.stats
    }

    pub fn level_data(&self) -> LevelData {
        self.engine.level_data()
    }

    pub fn xp_history(&self) -> Vec<&XpGrant> {
        self.engine.xp_history()
    }

    pub fn active_multipliers(&mut self, now: DateTime<FixedOffset>) -> &[Multiplier] {
        self.engine.active_multipliers(now)
    }

    pub fn workouts(&self) -> Result<Vec<WorkoutSession>> {
        self.engine.store().get_workouts()
    }

    pub fn chart(&self, period: ChartPeriod, now: DateTime<FixedOffset>) -> Result<Vec<u32>> {
        Ok(chart_data(&self.workouts()?, period, now.date_naive()))
    }

    pub fn grant(&mut self, source_key: &str, multiplier: f64, now: DateTime<FixedOffset>) -> Result<GrantEvent, ProgressionError> {
        self.engine.grant_xp(source_key, multiplier, now)
    }

    pub fn add_multiplier(
        &mut self,
        kind: MultiplierKind,
        factor: f64,
        duration_minutes: Option<u32>,
        description: &str,
        now: DateTime<FixedOffset>,
    ) -> Result<(), ProgressionError> {
        self.engine.add_multiplier(kind, factor, duration_minutes, description, now)
    }

    /// App start: daily login bonus plus the daily achievement check
    pub fn start_day(&mut self, now: DateTime<FixedOffset>) -> Result<DayStart> {
        let login = self.engine.check_daily_login(now);
        let worked_out = worked_out_on(&self.workouts()?, now.date_naive());
        let (achievements, grants) = self.check_achievements(worked_out, now);

        Ok(DayStart { login, achievements, grants })
    }

    /// Log a finished workout and hand out everything it earned
    pub fn complete_workout(&mut self, session: WorkoutSession, now: DateTime<FixedOffset>) -> Result<WorkoutReport> {
        let session_id = self
            .engine
            .store_mut()
            .add_workout(&session)
            .context("saving workout session")?;
        info!("Workout {} logged: {} min, {} kcal", session.workout_name, session.duration_minutes, session.calories);

        let history = self.workouts()?;
        self.stats.record(&session, now.date_naive(), &history);
        self.save_blob(USER_STATS_KEY, &self.stats.clone());

        let mut grants = Vec::new();
        if session.completed {
            grants.extend(self.engine.on_workout_complete(session.duration_minutes, now));
            self.book.record_workout_hour(session.ended_at.hour());
        }

        let worked_out = worked_out_on(&history, now.date_naive());
        let (achievements, achievement_grants) = self.check_achievements(worked_out, now);
        grants.extend(achievement_grants);

        Ok(WorkoutReport {
            session_id,
            grants,
            achievements,
            stats: self.stats.clone(),
        })
    }

    pub fn social_interaction(&mut self, action: SocialAction, now: DateTime<FixedOffset>) -> Result<GrantEvent, ProgressionError> {
        self.engine.on_social_interaction(action, now)
    }

    /// Update friend / challenge-win counters (they come from the backend)
    pub fn update_social_progress(
        &mut self,
        kind: SocialProgress,
        count: u32,
        now: DateTime<FixedOffset>,
    ) -> Result<(AchievementReport, Vec<GrantEvent>)> {
        self.book.update_social_progress(kind, count);
        let worked_out = worked_out_on(&self.workouts()?, now.date_naive());
        Ok(self.check_achievements(worked_out, now))
    }

    pub fn challenge_complete(&mut self, position: u32, now: DateTime<FixedOffset>) -> Result<GrantEvent, ProgressionError> {
        self.engine.on_challenge_complete(position, now)
    }

    /// Run the achievement check and grant XP for every positive unlock
    fn check_achievements(&mut self, worked_out_today: bool, now: DateTime<FixedOffset>) -> (AchievementReport, Vec<GrantEvent>) {
        let report = self.book.check(&self.stats, worked_out_today, now);

        let grants = report
            .unlocked
            .iter()
            .filter(|a| a.points > 0)
            .filter_map(|a| self.engine.on_achievement_unlocked(a.rarity, now).ok())
            .collect();

        self.save_blob(ACHIEVEMENTS_KEY, &self.book.clone());
        (report, grants)
    }

    /// Best-effort write; in-memory state stays authoritative on failure
    fn save_blob<T: Serialize>(&mut self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.engine.store_mut().save_blob(key, &json));
        if let Err(e) = result {
            warn!("{}", ProgressionError::persistence(&e));
        }
    }

    pub fn export_json(&self) -> Result<String> {
        let data = ExportData {
            history: self.workouts()?,
            stats: self.stats.clone(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Replace history and stats with an export. Level state is untouched.
    pub fn import_json(&mut self, json: &str) -> Result<usize> {
        let data: ExportData = serde_json::from_str(json).context("parsing export data")?;
        self.engine.store_mut().replace_workouts(&data.history)?;
        self.stats = data.stats;
        let json = serde_json::to_string(&self.stats)?;
        self.engine.store_mut().save_blob(USER_STATS_KEY, &json)?;
        info!("Imported {} workouts", data.history.len());
        Ok(data.history.len())
    }
}

fn load_blob_or_default<S: StateStore, T: for<'de> Deserialize<'de> + Default>(store: &S, key: &str) -> Result<T> {
    Ok(match store.load_blob(key)? {
        Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("Discarding unreadable {} blob: {}", key, e);
            T::default()
        }),
        None => T::default(),
    })
}
