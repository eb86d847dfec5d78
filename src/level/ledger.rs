//! XP ledger - bounded record of grants, newest last

use std::collections::VecDeque;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One applied XP grant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct XpGrant {
    pub source_id: String,
    pub name: String,
    pub icon: String,
    pub base_amount: u64,
    /// Total multiplier that was applied to `base_amount`
    pub multiplier: f64,
    pub amount: u64,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct XpLedger {
    entries: VecDeque<XpGrant>,
}

impl XpLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a grant, dropping the oldest entries beyond `retention`
    pub fn record(&mut self, grant: XpGrant, retention: usize) {
        self.entries.push_back(grant);
        self.trim(retention);
    }

    pub fn trim(&mut self, retention: usize) {
        while self.entries.len() > retention {
            self.entries.pop_front();
        }
    }

    /// Up to `limit` most recent grants, oldest first
    pub fn recent(&self, limit: usize) -> Vec<&XpGrant> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &XpGrant> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&XpGrant> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn grant(amount: u64) -> XpGrant {
        XpGrant {
            source_id: "LIKE_RECEIVED".to_string(),
            name: "Получен лайк".to_string(),
            icon: "❤️".to_string(),
            base_amount: 5,
            multiplier: 1.0,
            amount,
            timestamp: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn test_record_within_retention() {
        let mut ledger = XpLedger::new();
        ledger.record(grant(1), 3);
        ledger.record(grant(2), 3);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.last().unwrap().amount, 2);
    }

    #[test]
    fn test_oldest_dropped_first() {
        let mut ledger = XpLedger::new();
        for i in 1..=5 {
            ledger.record(grant(i), 3);
        }
        let amounts: Vec<u64> = ledger.iter().map(|g| g.amount).collect();
        assert_eq!(amounts, vec![3, 4, 5]);
    }

    #[test]
    fn test_recent_is_oldest_first() {
        let mut ledger = XpLedger::new();
        for i in 1..=10 {
            ledger.record(grant(i), 100);
        }
        let amounts: Vec<u64> = ledger.recent(3).iter().map(|g| g.amount).collect();
        assert_eq!(amounts, vec![8, 9, 10]);
        assert_eq!(ledger.recent(50).len(), 10);
    }
}
