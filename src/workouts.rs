//! Workout log and user statistics

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sessions kept in the workout history
pub const MAX_HISTORY_ITEMS: usize = 100;

/// Workouts per week the user aims for by default
pub const DEFAULT_WEEKLY_GOAL: u32 = 5;

/// Duration that earns the "perfect workout" bonus
pub const PERFECT_WORKOUT_MINUTES: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseEntry {
    pub name: String,
    pub sets: u32,
    pub reps: Option<u32>,
    pub duration_secs: Option<u32>,
    pub completed: bool,
}

/// One finished (or abandoned) workout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSession {
    pub id: Option<i64>,
    pub workout_id: String,
    pub workout_name: String,
    pub date: NaiveDate,
    pub started_at: DateTime<FixedOffset>,
    pub ended_at: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub exercises: Vec<ExerciseEntry>,
    pub calories: u32,
    pub completed: bool,
}

impl WorkoutSession {
    /// Completed session that ended at `ended_at` and lasted `duration_minutes`
    pub fn completed(
        workout_name: impl Into<String>,
        duration_minutes: u32,
        calories: u32,
        ended_at: DateTime<FixedOffset>,
    ) -> Self {
        let workout_name = workout_name.into();
        Self {
            id: None,
            workout_id: workout_name.to_lowercase().replace(' ', "_"),
            workout_name,
            date: ended_at.date_naive(),
            started_at: ended_at - Duration::minutes(i64::from(duration_minutes)),
            ended_at,
            duration_minutes,
            exercises: Vec::new(),
            calories,
            completed: true,
        }
    }
}

/// Aggregated workout statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_workouts: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_minutes: u32,
    pub total_calories: u32,
    pub last_workout_date: Option<NaiveDate>,
    pub weekly_goal: u32,
    pub weekly_completed: u32,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            total_workouts: 0,
            current_streak: 0,
            longest_streak: 0,
            total_minutes: 0,
            total_calories: 0,
            last_workout_date: None,
            weekly_goal: DEFAULT_WEEKLY_GOAL,
            weekly_completed: 0,
        }
    }
}

impl UserStats {
    /// Fold a session into the stats.
    ///
    /// `history` must already contain `session`. Incomplete sessions are ignored.
    pub fn record(&mut self, session: &WorkoutSession, today: NaiveDate, history: &[WorkoutSession]) {
        if !session.completed {
            return;
        }

        self.total_workouts += 1;
        self.total_minutes += session.duration_minutes;
        self.total_calories += session.calories;

        match self.last_workout_date {
            Some(last) => {
                let days = (today - last).num_days();
                if days == 1 {
                    self.current_streak += 1;
                } else if days > 1 {
                    self.current_streak = 1;
                }
                // Same day: second workout, streak unchanged
            }
            None => self.current_streak = 1,
        }
        self.longest_streak = self.longest_streak.max(self.current_streak);

        let monday = week_start(today);
        self.weekly_completed = if session.date >= monday {
            history
                .iter()
                .filter(|w| w.completed && w.date >= monday)
                .count() as u32
        } else {
            1
        };

        self.last_workout_date = Some(today);
    }

    /// Share of the weekly goal done (0-100%)
    pub fn weekly_progress(&self) -> f64 {
        if self.weekly_goal == 0 {
            return 100.0;
        }
        (self.weekly_completed as f64 / self.weekly_goal as f64 * 100.0).min(100.0)
    }
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn worked_out_on(history: &[WorkoutSession], date: NaiveDate) -> bool {
    history.iter().any(|w| w.completed && w.date == date)
}

/// Sessions from the last `days` days (inclusive of today)
pub fn recent_workouts(history: &[WorkoutSession], days: i64, today: NaiveDate) -> Vec<&WorkoutSession> {
    let cutoff = today - Duration::days(days);
    history.iter().filter(|w| w.date >= cutoff).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartPeriod {
    Week,
    Month,
    Year,
}

impl FromStr for ChartPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "week" => Ok(ChartPeriod::Week),
            "month" => Ok(ChartPeriod::Month),
            "year" => Ok(ChartPeriod::Year),
            other => anyhow::bail!("unknown chart period: {}", other),
        }
    }
}

/// Completed-workout counts per bucket, oldest bucket first.
///
/// Week: 7 days. Month: 4 rolling 7-day windows. Year: 12 calendar months.
pub fn chart_data(history: &[WorkoutSession], period: ChartPeriod, today: NaiveDate) -> Vec<u32> {
    let completed = || history.iter().filter(|w| w.completed);

    match period {
        ChartPeriod::Week => (0..7)
            .map(|i| {
                let day = today - Duration::days(6 - i);
                completed().filter(|w| w.date == day).count() as u32
            })
            .collect(),

        ChartPeriod::Month => (0..4)
            .map(|i| {
                let start = today - Duration::days((3 - i) * 7);
                let end = start + Duration::days(7);
                completed().filter(|w| w.date >= start && w.date < end).count() as u32
            })
            .collect(),

        ChartPeriod::Year => {
            let current = today.year() * 12 + today.month0() as i32;
            (0..12)
                .map(|i| {
                    let month_index = current - (11 - i);
                    completed()
                        .filter(|w| w.date.year() * 12 + w.date.month0() as i32 == month_index)
                        .count() as u32
                })
                .collect()
        }
    }
}
