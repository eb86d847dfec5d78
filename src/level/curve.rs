//! Level curve - XP required to clear each level

/// Base XP needed to clear level 1
pub const BASE_XP: u64 = 100;

/// Difficulty growth per level
pub const GROWTH_RATE: f64 = 1.5;

/// Exponential level curve: `floor(base_xp * growth_rate^(level - 1))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelCurve {
    pub base_xp: u64,
    pub growth_rate: f64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            base_xp: BASE_XP,
            growth_rate: GROWTH_RATE,
        }
    }
}

impl LevelCurve {
    pub fn new(base_xp: u64, growth_rate: f64) -> Self {
        Self { base_xp, growth_rate }
    }

    /// XP needed to go from `level` to `level + 1`.
    ///
    /// Never returns 0, so the level-up loop always terminates.
    /// Saturates at `u64::MAX` for very high levels.
    pub fn required_xp(&self, level: u32) -> u64 {
        let exponent = level.saturating_sub(1) as i32;
        let required = (self.base_xp as f64 * self.growth_rate.powi(exponent)).floor();
        // `as` saturates on overflow and maps NaN to 0
        (required as u64).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_levels() {
        let curve = LevelCurve::default();
        assert_eq!(curve.required_xp(1), 100);
        assert_eq!(curve.required_xp(2), 150);
        assert_eq!(curve.required_xp(3), 225);
        assert_eq!(curve.required_xp(4), 337);
        assert_eq!(curve.required_xp(5), 506);
    }

    #[test]
    fn test_strictly_increasing() {
        let curve = LevelCurve::default();
        for level in 1..90 {
            assert!(
                curve.required_xp(level + 1) > curve.required_xp(level),
                "curve not increasing at level {}",
                level
            );
        }
    }

    #[test]
    fn test_level_zero_treated_as_first() {
        let curve = LevelCurve::default();
        assert_eq!(curve.required_xp(0), curve.required_xp(1));
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        let curve = LevelCurve::default();
        assert_eq!(curve.required_xp(500), u64::MAX);
    }

    #[test]
    fn test_never_zero() {
        let curve = LevelCurve::new(0, 1.5);
        assert_eq!(curve.required_xp(1), 1);
    }
}
