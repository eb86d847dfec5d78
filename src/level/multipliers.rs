//! XP multipliers
//!
//! Two kinds of factors stack on every grant:
//! - time-bounded multipliers added by callers (events, challenges)
//! - fixed step bonuses derived from streak, weekday and hour

use chrono::{DateTime, Duration, FixedOffset, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MultiplierKind {
    Streak,
    Weekend,
    TimeOfDay,
    Challenge,
    Friend,
    Event,
}

impl MultiplierKind {
    pub fn all() -> &'static [MultiplierKind] {
        &[
            MultiplierKind::Streak,
            MultiplierKind::Weekend,
            MultiplierKind::TimeOfDay,
            MultiplierKind::Challenge,
            MultiplierKind::Friend,
            MultiplierKind::Event,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MultiplierKind::Streak => "streak",
            MultiplierKind::Weekend => "weekend",
            MultiplierKind::TimeOfDay => "time-of-day",
            MultiplierKind::Challenge => "challenge",
            MultiplierKind::Friend => "friend",
            MultiplierKind::Event => "event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.as_str() == s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Multiplier {
    pub kind: MultiplierKind,
    pub factor: f64,
    pub description: String,
    /// `None` = never expires
    pub expires_at: Option<DateTime<FixedOffset>>,
}

impl Multiplier {
    pub fn is_expired(&self, now: DateTime<FixedOffset>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Active multipliers. Expiry is evaluated lazily on every read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct MultiplierSet {
    entries: Vec<Multiplier>,
}

impl MultiplierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factor must be positive and finite; callers validate it.
    pub fn add(
        &mut self,
        kind: MultiplierKind,
        factor: f64,
        duration_minutes: Option<u32>,
        description: impl Into<String>,
        now: DateTime<FixedOffset>,
    ) {
        let expires_at = duration_minutes.map(|m| now + Duration::minutes(i64::from(m)));
        self.entries.push(Multiplier {
            kind,
            factor,
            description: description.into(),
            expires_at,
        });
    }

    /// Drop everything with `expires_at <= now`, return how many were removed
    pub fn purge_expired(&mut self, now: DateTime<FixedOffset>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|m| !m.is_expired(now));
        before - self.entries.len()
    }

    /// Product of all unexpired factors (1.0 when empty)
    pub fn active_factor(&mut self, now: DateTime<FixedOffset>) -> f64 {
        self.purge_expired(now);
        self.entries.iter().map(|m| m.factor).product()
    }

    pub fn active(&mut self, now: DateTime<FixedOffset>) -> &[Multiplier] {
        self.purge_expired(now);
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Login streak that unlocks the big streak bonus
pub const LONG_STREAK_DAYS: u32 = 7;
/// Login streak that unlocks the small streak bonus
pub const SHORT_STREAK_DAYS: u32 = 3;

pub fn streak_bonus(streak: u32) -> f64 {
    if streak >= LONG_STREAK_DAYS {
        1.2
    } else if streak >= SHORT_STREAK_DAYS {
        1.1
    } else {
        1.0
    }
}

pub fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

pub fn weekend_bonus(day: Weekday) -> f64 {
    if is_weekend(day) { 1.5 } else { 1.0 }
}

/// Time of day a workout or grant falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPart {
    Morning,
    Evening,
    Other,
}

pub fn day_part(hour: u32) -> DayPart {
    match hour {
        5..=8 => DayPart::Morning,
        20..=23 => DayPart::Evening,
        _ => DayPart::Other,
    }
}

pub fn time_of_day_bonus(hour: u32) -> f64 {
    match day_part(hour) {
        DayPart::Morning => 1.3,
        DayPart::Evening => 1.2,
        DayPart::Other => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 19, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_set_factor_is_one() {
        let mut set = MultiplierSet::new();
        assert_eq!(set.active_factor(at(12, 0)), 1.0);
    }

    #[test]
    fn test_factors_multiply() {
        let mut set = MultiplierSet::new();
        set.add(MultiplierKind::Event, 2.0, Some(60), "x2 weekend event", at(12, 0));
        set.add(MultiplierKind::Friend, 1.5, None, "друг", at(12, 0));
        assert_eq!(set.active_factor(at(12, 30)), 3.0);
    }

    #[test]
    fn test_expired_excluded_without_cleanup_call() {
        let mut set = MultiplierSet::new();
        set.add(MultiplierKind::Weekend, 1.5, Some(60), "weekend", at(12, 0));
        set.add(MultiplierKind::Event, 2.0, None, "forever", at(12, 0));

        assert_eq!(set.active_factor(at(12, 59)), 3.0);
        // expires_at == now counts as expired
        assert_eq!(set.active_factor(at(13, 0)), 2.0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_never_expiring_multiplier() {
        let mut set = MultiplierSet::new();
        set.add(MultiplierKind::Challenge, 1.25, None, "challenge", at(0, 0));
        let far_future = at(0, 0) + Duration::days(3650);
        assert_eq!(set.active(far_future).len(), 1);
    }

    #[test]
    fn test_streak_bonus_thresholds() {
        assert_eq!(streak_bonus(0), 1.0);
        assert_eq!(streak_bonus(2), 1.0);
        assert_eq!(streak_bonus(3), 1.1);
        assert_eq!(streak_bonus(6), 1.1);
        assert_eq!(streak_bonus(7), 1.2);
        assert_eq!(streak_bonus(100), 1.2);
    }

    #[test]
    fn test_weekend_bonus() {
        assert_eq!(weekend_bonus(Weekday::Sat), 1.5);
        assert_eq!(weekend_bonus(Weekday::Sun), 1.5);
        assert_eq!(weekend_bonus(Weekday::Mon), 1.0);
        assert_eq!(weekend_bonus(Weekday::Fri), 1.0);
    }

    #[test]
    fn test_time_of_day_bonus_windows() {
        assert_eq!(time_of_day_bonus(4), 1.0);
        assert_eq!(time_of_day_bonus(5), 1.3);
        assert_eq!(time_of_day_bonus(8), 1.3);
        assert_eq!(time_of_day_bonus(9), 1.0);
        assert_eq!(time_of_day_bonus(12), 1.0);
        assert_eq!(time_of_day_bonus(20), 1.2);
        assert_eq!(time_of_day_bonus(23), 1.2);
        assert_eq!(time_of_day_bonus(0), 1.0);
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(MultiplierKind::parse("time-of-day"), Some(MultiplierKind::TimeOfDay));
        assert_eq!(MultiplierKind::parse("event"), Some(MultiplierKind::Event));
        assert_eq!(MultiplierKind::parse("bogus"), None);
    }

    #[test]
    fn test_serialized_shape() {
        let mut set = MultiplierSet::new();
        set.add(MultiplierKind::TimeOfDay, 1.3, None, "утро", at(6, 0));
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json[0]["kind"], "time-of-day");
        assert_eq!(json[0]["factor"], 1.3);
        assert!(json[0]["expiresAt"].is_null());
    }
}
