//! XP sources - каталог источников опыта

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceCategory {
    Workout,     // Тренировки
    Exercise,    // Упражнения
    Social,      // Социальные
    Daily,       // Ежедневные
    Achievement, // Достижения
    Special,     // Специальные
}

#[derive(Debug, Clone)]
pub struct XpSource {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub category: SourceCategory,
    pub base: u64,
}

macro_rules! source {
    ($id:literal, $base:literal, $name:literal, $icon:literal, $category:ident) => {
        XpSource {
            id: $id,
            name: $name,
            icon: $icon,
            category: SourceCategory::$category,
            base: $base,
        }
    };
}

pub const XP_SOURCES: &[XpSource] = &[
    // Тренировки
    source!("WORKOUT_COMPLETE", 50, "Тренировка завершена", "💪", Workout),
    source!("PERFECT_WORKOUT", 100, "Идеальная тренировка", "⭐", Workout),
    source!("FIRST_WORKOUT_DAY", 30, "Первая тренировка дня", "🌅", Workout),
    source!("WORKOUT_STREAK_3", 50, "Серия 3 дня", "🔥", Workout),
    source!("WORKOUT_STREAK_7", 100, "Серия 7 дней", "⚡", Workout),
    source!("WORKOUT_STREAK_30", 500, "Серия 30 дней", "🏆", Workout),
    // Упражнения
    source!("EXERCISE_COMPLETE", 5, "Упражнение выполнено", "✅", Exercise),
    source!("PERSONAL_RECORD", 75, "Личный рекорд", "🎯", Exercise),
    source!("ALL_SETS_COMPLETE", 25, "Все подходы выполнены", "💯", Exercise),
    // Социальные
    source!("FRIEND_ADDED", 20, "Друг добавлен", "🤝", Social),
    source!("CHALLENGE_WIN", 150, "Победа в челлендже", "🥇", Social),
    source!("CHALLENGE_PARTICIPATION", 30, "Участие в челлендже", "🎮", Social),
    source!("WORKOUT_SHARED", 15, "Результат опубликован", "📱", Social),
    source!("LIKE_RECEIVED", 5, "Получен лайк", "❤️", Social),
    source!("COMMENT_RECEIVED", 10, "Получен комментарий", "💬", Social),
    // Ежедневные
    source!("DAILY_LOGIN", 10, "Ежедневный вход", "📅", Daily),
    source!("DAILY_BONUS_1", 10, "День 1", "1️⃣", Daily),
    source!("DAILY_BONUS_2", 20, "День 2", "2️⃣", Daily),
    source!("DAILY_BONUS_3", 30, "День 3", "3️⃣", Daily),
    source!("DAILY_BONUS_4", 40, "День 4", "4️⃣", Daily),
    source!("DAILY_BONUS_5", 50, "День 5", "5️⃣", Daily),
    source!("DAILY_BONUS_6", 60, "День 6", "6️⃣", Daily),
    source!("DAILY_BONUS_7", 100, "Неделя входов", "7️⃣", Daily),
    // Достижения
    source!("ACHIEVEMENT_UNLOCK", 50, "Достижение разблокировано", "🏅", Achievement),
    source!("RARE_ACHIEVEMENT", 100, "Редкое достижение", "💎", Achievement),
    source!("EPIC_ACHIEVEMENT", 200, "Эпическое достижение", "🔮", Achievement),
    source!("LEGENDARY_ACHIEVEMENT", 500, "Легендарное достижение", "👑", Achievement),
    // Специальные
    source!("MORNING_WORKOUT", 25, "Утренняя тренировка", "🌅", Special),
    source!("EVENING_WORKOUT", 25, "Вечерняя тренировка", "🌙", Special),
    source!("WEEKEND_WARRIOR", 40, "Тренировка в выходные", "🎉", Special),
    source!("COMEBACK", 100, "Возвращение после перерыва", "💫", Special),
    source!("MILESTONE_10_WORKOUTS", 100, "10 тренировок", "🎯", Special),
    source!("MILESTONE_50_WORKOUTS", 500, "50 тренировок", "🏆", Special),
    source!("MILESTONE_100_WORKOUTS", 1000, "100 тренировок", "💯", Special),
];

/// Longest streak day that still has a day-indexed bonus
pub const MAX_DAILY_BONUS_DAY: u32 = 7;

pub fn find_source(id: &str) -> Option<&'static XpSource> {
    XP_SOURCES.iter().find(|s| s.id == id)
}

/// Source key of the day-indexed login bonus (`DAILY_BONUS_{day}`)
pub fn daily_bonus_key(day: u32) -> String {
    format!("DAILY_BONUS_{}", day)
}
