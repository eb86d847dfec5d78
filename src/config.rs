//! Engine configuration

use anyhow::{Result, ensure};

use crate::level::LevelCurve;

/// Default number of XP grants kept in the ledger
pub const DEFAULT_LEDGER_RETENTION: usize = 100;

/// Tunables for the progression engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub curve: LevelCurve,
    /// Most recent grants kept in `xpHistory`
    pub ledger_retention: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            curve: LevelCurve::default(),
            ledger_retention: DEFAULT_LEDGER_RETENTION,
        }
    }
}

impl EngineConfig {
    /// Checked constructor: the curve must be strictly increasing and never zero
    pub fn new(base_xp: u64, growth_rate: f64, ledger_retention: usize) -> Result<Self> {
        ensure!(base_xp > 0, "base XP must be positive");
        ensure!(
            growth_rate.is_finite() && growth_rate > 1.0,
            "growth rate must be a finite number above 1, got {}",
            growth_rate
        );

        Ok(Self {
            curve: LevelCurve::new(base_xp, growth_rate),
            ledger_retention: ledger_retention.max(1),
        })
    }
}
