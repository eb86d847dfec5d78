//! Achievements - разблокируемые награды
//!
//! Streak achievements can be lost again when the streak breaks.
//! "Anti-achievements" (negative points) unlock after long breaks.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::level::Rarity;
use crate::workouts::UserStats;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AchievementCategory {
    Workout,
    Streak,
    Social,
    Special,
}

impl AchievementCategory {
    pub fn name(&self) -> &'static str {
        match self {
            AchievementCategory::Workout => "Тренировки",
            AchievementCategory::Streak => "Серии",
            AchievementCategory::Social => "Социальные",
            AchievementCategory::Special => "Особые",
        }
    }
}

/// Where an achievement's progress comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalWorkouts,
    WorkoutStreak,
    TotalCalories,
    DaysOff,
    /// Counters fed by the caller, not derived from stats
    Friends,
    ChallengeWins,
    MorningWorkouts,
    NightWorkouts,
}

#[derive(Debug, Clone)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: AchievementCategory,
    pub metric: Metric,
    pub requirement: u32,
    pub rarity: Rarity,
    pub points: i32,
    pub can_lose: bool,
    pub lose_condition: Option<&'static str>,
}

const STREAK_LOST: Option<&str> = Some("Пропустите день тренировки");

pub const ACHIEVEMENTS: &[Achievement] = &[
    // === ТРЕНИРОВКИ ===
    Achievement {
        id: "first_workout",
        title: "Первый шаг",
        description: "Завершите первую тренировку",
        icon: "🎯",
        category: AchievementCategory::Workout,
        metric: Metric::TotalWorkouts,
        requirement: 1,
        rarity: Rarity::Common,
        points: 10,
        can_lose: false,
        lose_condition: None,
    },
    Achievement {
        id: "workout_10",
        title: "Разминаемся",
        description: "Завершите 10 тренировок",
        icon: "💪",
        category: AchievementCategory::Workout,
        metric: Metric::TotalWorkouts,
        requirement: 10,
        rarity: Rarity::Common,
        points: 25,
        can_lose: false,
        lose_condition: None,
    },
    Achievement {
        id: "workout_50",
        title: "Фитнес-энтузиаст",
        description: "Завершите 50 тренировок",
        icon: "🏋️",
        category: AchievementCategory::Workout,
        metric: Metric::TotalWorkouts,
        requirement: 50,
        rarity: Rarity::Rare,
        points: 100,
        can_lose: false,
        lose_condition: None,
    },
    Achievement {
        id: "workout_100",
        title: "Железный человек",
        description: "Завершите 100 тренировок",
        icon: "🦾",
        category: AchievementCategory::Workout,
        metric: Metric::TotalWorkouts,
        requirement: 100,
        rarity: Rarity::Epic,
        points: 250,
        can_lose: false,
        lose_condition: None,
    },
    // === СЕРИИ (могут исчезнуть) ===
    Achievement {
        id: "streak_3",
        title: "Три дня подряд",
        description: "Тренируйтесь 3 дня подряд",
        icon: "🔥",
        category: AchievementCategory::Streak,
        metric: Metric::WorkoutStreak,
        requirement: 3,
        rarity: Rarity::Common,
        points: 15,
        can_lose: true,
        lose_condition: STREAK_LOST,
    },
    Achievement {
        id: "streak_7",
        title: "Недельный воин",
        description: "Тренируйтесь 7 дней подряд",
        icon: "⚡",
        category: AchievementCategory::Streak,
        metric: Metric::WorkoutStreak,
        requirement: 7,
        rarity: Rarity::Rare,
        points: 50,
        can_lose: true,
        lose_condition: STREAK_LOST,
    },
    Achievement {
        id: "streak_30",
        title: "Месячный марафон",
        description: "Тренируйтесь 30 дней подряд",
        icon: "🏆",
        category: AchievementCategory::Streak,
        metric: Metric::WorkoutStreak,
        requirement: 30,
        rarity: Rarity::Epic,
        points: 200,
        can_lose: true,
        lose_condition: STREAK_LOST,
    },
    Achievement {
        id: "streak_100",
        title: "Легенда дисциплины",
        description: "Тренируйтесь 100 дней подряд",
        icon: "👑",
        category: AchievementCategory::Streak,
        metric: Metric::WorkoutStreak,
        requirement: 100,
        rarity: Rarity::Legendary,
        points: 1000,
        can_lose: true,
        lose_condition: STREAK_LOST,
    },
    // === СОЦИАЛЬНЫЕ ===
    Achievement {
        id: "first_friend",
        title: "Не одинок",
        description: "Добавьте первого друга",
        icon: "🤝",
        category: AchievementCategory::Social,
        metric: Metric::Friends,
        requirement: 1,
        rarity: Rarity::Common,
        points: 20,
        can_lose: false,
        lose_condition: None,
    },
    Achievement {
        id: "social_butterfly",
        title: "Душа компании",
        description: "Добавьте 10 друзей",
        icon: "🦋",
        category: AchievementCategory::Social,
        metric: Metric::Friends,
        requirement: 10,
        rarity: Rarity::Rare,
        points: 75,
        can_lose: false,
        lose_condition: None,
    },
    Achievement {
        id: "challenge_winner",
        title: "Победитель",
        description: "Выиграйте челлендж",
        icon: "🥇",
        category: AchievementCategory::Social,
        metric: Metric::ChallengeWins,
        requirement: 1,
        rarity: Rarity::Rare,
        points: 100,
        can_lose: false,
        lose_condition: None,
    },
    // === ОСОБЫЕ ===
    Achievement {
        id: "morning_bird",
        title: "Ранняя пташка",
        description: "Тренируйтесь до 7 утра 5 раз",
        icon: "🌅",
        category: AchievementCategory::Special,
        metric: Metric::MorningWorkouts,
        requirement: 5,
        rarity: Rarity::Rare,
        points: 60,
        can_lose: true,
        lose_condition: Some("Не тренируйтесь утром 2 недели"),
    },
    Achievement {
        id: "night_owl",
        title: "Ночная сова",
        description: "Тренируйтесь после 22:00 5 раз",
        icon: "🦉",
        category: AchievementCategory::Special,
        metric: Metric::NightWorkouts,
        requirement: 5,
        rarity: Rarity::Rare,
        points: 60,
        can_lose: true,
        lose_condition: Some("Не тренируйтесь вечером 2 недели"),
    },
    Achievement {
        id: "calorie_burner",
        title: "Сжигатель калорий",
        description: "Сожгите 10000 калорий",
        icon: "🔥",
        category: AchievementCategory::Special,
        metric: Metric::TotalCalories,
        requirement: 10000,
        rarity: Rarity::Epic,
        points: 300,
        can_lose: false,
        lose_condition: None,
    },
    // === АНТИДОСТИЖЕНИЯ ===
    Achievement {
        id: "lazy_week",
        title: "Ленивая неделя",
        description: "Не тренировались 7 дней",
        icon: "😴",
        category: AchievementCategory::Special,
        metric: Metric::DaysOff,
        requirement: 7,
        rarity: Rarity::Common,
        points: -50,
        can_lose: false,
        lose_condition: None,
    },
    Achievement {
        id: "lost_way",
        title: "Потерял путь",
        description: "Не тренировались 30 дней",
        icon: "❌",
        category: AchievementCategory::Special,
        metric: Metric::DaysOff,
        requirement: 30,
        rarity: Rarity::Rare,
        points: -200,
        can_lose: false,
        lose_condition: None,
    },
];

/// Hour before which a workout counts as early
pub const EARLY_WORKOUT_HOUR: u32 = 7;
/// Hour from which a workout counts as late
pub const LATE_WORKOUT_HOUR: u32 = 22;

/// Saved progress of one achievement
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AchievementProgress {
    pub current_progress: u32,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<FixedOffset>>,
}

/// Changes produced by one check
#[derive(Debug, Default, Clone)]
pub struct AchievementReport {
    pub unlocked: Vec<&'static Achievement>,
    pub lost: Vec<&'static Achievement>,
}

impl AchievementReport {
    pub fn is_empty(&self) -> bool {
        self.unlocked.is_empty() && self.lost.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialProgress {
    Friends,
    Challenges,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AchievementSummary {
    pub total: usize,
    pub unlocked: usize,
    pub percentage: u32,
    pub points: i32,
}

/// Progress across the whole catalogue, persisted as the `achievements` blob
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AchievementBook {
    #[serde(default)]
    progress: BTreeMap<String, AchievementProgress>,
    #[serde(default)]
    last_check_date: Option<NaiveDate>,
    #[serde(default)]
    consecutive_days_off: u32,
}

impl AchievementBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self, id: &str) -> AchievementProgress {
        self.progress.get(id).cloned().unwrap_or_default()
    }

    fn entry(&mut self, id: &str) -> &mut AchievementProgress {
        self.progress.entry(id.to_string()).or_default()
    }

    pub fn consecutive_days_off(&self) -> u32 {
        self.consecutive_days_off
    }

    /// Count an early or late workout toward the time-of-day achievements
    pub fn record_workout_hour(&mut self, hour: u32) {
        let metric = if hour < EARLY_WORKOUT_HOUR {
            Metric::MorningWorkouts
        } else if hour >= LATE_WORKOUT_HOUR {
            Metric::NightWorkouts
        } else {
            return;
        };

        for achievement in ACHIEVEMENTS.iter().filter(|a| a.metric == metric) {
            self.entry(achievement.id).current_progress += 1;
        }
    }

    pub fn update_social_progress(&mut self, kind: SocialProgress, count: u32) {
        let metric = match kind {
            SocialProgress::Friends => Metric::Friends,
            SocialProgress::Challenges => Metric::ChallengeWins,
        };
        for achievement in ACHIEVEMENTS.iter().filter(|a| a.metric == metric) {
            self.entry(achievement.id).current_progress = count;
        }
    }

    /// Refresh progress from stats and unlock / lose achievements.
    ///
    /// On the first check of a new day the days-off counter moves:
    /// reset if the user worked out today, +1 otherwise.
    pub fn check(&mut self, stats: &UserStats, worked_out_today: bool, now: DateTime<FixedOffset>) -> AchievementReport {
        let today = now.date_naive();
        match self.last_check_date {
            Some(last) if last == today => {}
            Some(_) => {
                if worked_out_today {
                    self.consecutive_days_off = 0;
                } else {
                    self.consecutive_days_off += 1;
                }
                self.last_check_date = Some(today);
            }
            None => self.last_check_date = Some(today),
        }
        if worked_out_today {
            self.consecutive_days_off = 0;
        }

        let days_off = self.consecutive_days_off;
        let mut report = AchievementReport::default();

        for achievement in ACHIEVEMENTS {
            let entry = self.entry(achievement.id);

            match achievement.metric {
                Metric::TotalWorkouts => entry.current_progress = stats.total_workouts,
                Metric::WorkoutStreak => entry.current_progress = stats.current_streak,
                Metric::TotalCalories => entry.current_progress = stats.total_calories,
                Metric::DaysOff => entry.current_progress = days_off,
                Metric::Friends | Metric::ChallengeWins | Metric::MorningWorkouts | Metric::NightWorkouts => {}
            }

            if achievement.metric == Metric::WorkoutStreak
                && achievement.can_lose
                && entry.unlocked
                && entry.current_progress < achievement.requirement
            {
                entry.unlocked = false;
                entry.unlocked_at = None;
                info!("Achievement lost: {} {}", achievement.icon, achievement.title);
                report.lost.push(achievement);
            }

            if !entry.unlocked && entry.current_progress >= achievement.requirement {
                entry.unlocked = true;
                entry.unlocked_at = Some(now);
                info!("Achievement unlocked: {} {}", achievement.icon, achievement.title);
                report.unlocked.push(achievement);
            }
        }

        report
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.progress.get(id).is_some_and(|p| p.unlocked)
    }

    pub fn unlocked(&self) -> Vec<&'static Achievement> {
        ACHIEVEMENTS.iter().filter(|a| self.is_unlocked(a.id)).collect()
    }

    pub fn by_category(&self, category: AchievementCategory) -> Vec<(&'static Achievement, AchievementProgress)> {
        ACHIEVEMENTS
            .iter()
            .filter(|a| a.category == category)
            .map(|a| (a, self.progress(a.id)))
            .collect()
    }

    /// Sum of points of unlocked achievements (negative ones included)
    pub fn total_points(&self) -> i32 {
        self.unlocked().iter().map(|a| a.points).sum()
    }

    /// Completion over positive-point achievements only
    pub fn summary(&self) -> AchievementSummary {
        let positive: Vec<_> = ACHIEVEMENTS.iter().filter(|a| a.points > 0).collect();
        let total = positive.len();
        let unlocked = positive.iter().filter(|a| self.is_unlocked(a.id)).count();
        let percentage = if total > 0 {
            (unlocked as f64 / total as f64 * 100.0).round() as u32
        } else {
            0
        };

        AchievementSummary {
            total,
            unlocked,
            percentage,
            points: self.total_points(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;

    fn day(d: i64) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 1, 12, 0, 0)
            .unwrap()
            + Duration::days(d)
    }

    fn stats(total_workouts: u32, current_streak: u32) -> UserStats {
        UserStats {
            total_workouts,
            current_streak,
            longest_streak: current_streak,
            ..UserStats::default()
        }
    }

    fn ids(list: &[&'static Achievement]) -> Vec<&'static str> {
        list.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_catalogue_ids_unique() {
        let unique: HashSet<_> = ACHIEVEMENTS.iter().map(|a| a.id).collect();
        assert_eq!(unique.len(), ACHIEVEMENTS.len());
    }

    #[test]
    fn test_losable_have_condition() {
        for a in ACHIEVEMENTS.iter().filter(|a| a.can_lose) {
            assert!(a.lose_condition.is_some(), "{} has no lose condition", a.id);
        }
    }

    #[test]
    fn test_first_workout_unlocks() {
        let mut book = AchievementBook::new();
        let report = book.check(&stats(1, 1), true, day(0));

        assert_eq!(ids(&report.unlocked), vec!["first_workout"]);
        assert!(book.is_unlocked("first_workout"));
        assert_eq!(book.total_points(), 10);
    }

    #[test]
    fn test_unlock_reported_once() {
        let mut book = AchievementBook::new();
        book.check(&stats(1, 1), true, day(0));
        let report = book.check(&stats(2, 1), true, day(0));
        assert!(report.is_empty());
    }

    #[test]
    fn test_streak_achievement_lost_when_streak_breaks() {
        let mut book = AchievementBook::new();
        let report = book.check(&stats(3, 3), true, day(0));
        assert!(ids(&report.unlocked).contains(&"streak_3"));

        let report = book.check(&stats(4, 1), true, day(5));
        assert_eq!(ids(&report.lost), vec!["streak_3"]);
        assert!(!book.is_unlocked("streak_3"));
        assert!(book.progress("streak_3").unlocked_at.is_none());
    }

    #[test]
    fn test_days_off_counter_and_lazy_week() {
        let mut book = AchievementBook::new();
        book.check(&stats(1, 1), true, day(0));

        let mut last = AchievementReport::default();
        for d in 1..=7 {
            last = book.check(&stats(1, 0), false, day(d));
        }
        assert_eq!(book.consecutive_days_off(), 7);
        assert_eq!(ids(&last.unlocked), vec!["lazy_week"]);
        assert_eq!(book.total_points(), 10 - 50);
    }

    #[test]
    fn test_days_off_counted_once_per_day() {
        let mut book = AchievementBook::new();
        book.check(&UserStats::default(), false, day(0));
        book.check(&UserStats::default(), false, day(1));
        book.check(&UserStats::default(), false, day(1));
        assert_eq!(book.consecutive_days_off(), 1);

        book.check(&stats(1, 1), true, day(1));
        assert_eq!(book.consecutive_days_off(), 0);
    }

    #[test]
    fn test_morning_counter() {
        let mut book = AchievementBook::new();
        for _ in 0..5 {
            book.record_workout_hour(6);
        }
        book.record_workout_hour(12);
        let report = book.check(&stats(5, 1), true, day(0));

        assert!(ids(&report.unlocked).contains(&"morning_bird"));
        assert!(!book.is_unlocked("night_owl"));
        assert_eq!(book.progress("morning_bird").current_progress, 5);
    }

    #[test]
    fn test_social_progress() {
        let mut book = AchievementBook::new();
        book.update_social_progress(SocialProgress::Friends, 3);
        let report = book.check(&UserStats::default(), false, day(0));

        assert_eq!(ids(&report.unlocked), vec!["first_friend"]);
        assert_eq!(book.progress("social_butterfly").current_progress, 3);

        book.update_social_progress(SocialProgress::Challenges, 1);
        let report = book.check(&UserStats::default(), false, day(0));
        assert_eq!(ids(&report.unlocked), vec!["challenge_winner"]);
    }

    #[test]
    fn test_summary_ignores_negative_achievements() {
        let mut book = AchievementBook::new();
        book.check(&stats(10, 1), true, day(0));
        let summary = book.summary();

        let positive = ACHIEVEMENTS.iter().filter(|a| a.points > 0).count();
        assert_eq!(summary.total, positive);
        assert_eq!(summary.unlocked, 2);
        assert_eq!(summary.points, 35);
        assert_eq!(summary.percentage, (2.0 / positive as f64 * 100.0).round() as u32);
    }

    #[test]
    fn test_by_category() {
        let book = AchievementBook::new();
        let streaks = book.by_category(AchievementCategory::Streak);
        assert_eq!(streaks.len(), 4);
        assert!(streaks.iter().all(|(_, p)| !p.unlocked));
    }

    #[test]
    fn test_book_roundtrip_json() {
        let mut book = AchievementBook::new();
        book.check(&stats(1, 1), true, day(0));
        let json = serde_json::to_string(&book).unwrap();
        let restored: AchievementBook = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, book);
    }
}
