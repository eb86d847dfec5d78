//! Rank table - cosmetic titles for level bands

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankBand {
    pub min_level: u32,
    pub max_level: u32,
    pub name: &'static str,
    pub icon: &'static str,
}

impl RankBand {
    pub fn contains(&self, level: u32) -> bool {
        level >= self.min_level && level <= self.max_level
    }
}

/// Ordered, non-overlapping bands starting at level 1
pub const RANKS: &[RankBand] = &[
    RankBand { min_level: 1, max_level: 4, name: "Новичок", icon: "🌱" },
    RankBand { min_level: 5, max_level: 9, name: "Ученик", icon: "📚" },
    RankBand { min_level: 10, max_level: 14, name: "Спортсмен", icon: "🏃" },
    RankBand { min_level: 15, max_level: 19, name: "Атлет", icon: "💪" },
    RankBand { min_level: 20, max_level: 29, name: "Воин", icon: "⚔️" },
    RankBand { min_level: 30, max_level: 39, name: "Мастер", icon: "🥋" },
    RankBand { min_level: 40, max_level: 49, name: "Чемпион", icon: "🏆" },
    RankBand { min_level: 50, max_level: 69, name: "Герой", icon: "🦸" },
    RankBand { min_level: 70, max_level: 99, name: "Легенда", icon: "⭐" },
    RankBand { min_level: 100, max_level: 999, name: "Бессмертный", icon: "👑" },
];

/// Rank for a level. The top band is sticky above its max.
pub fn rank_for(level: u32) -> &'static RankBand {
    let last = &RANKS[RANKS.len() - 1];
    if level > last.max_level {
        return last;
    }
    RANKS.iter().find(|r| r.contains(level)).unwrap_or(&RANKS[0])
}

/// First rank above the current one, or the current rank at the top
pub fn next_rank(level: u32) -> &'static RankBand {
    RANKS
        .iter()
        .find(|r| r.min_level > level)
        .unwrap_or_else(|| rank_for(level))
}
