//! Error taxonomy of the progression engine

/// Errors surfaced by the progression engine.
///
/// None of these interrupt the caller: an unknown source grants nothing,
/// a failed write leaves the in-memory state authoritative.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgressionError {
    #[error("Unknown XP source: {0}")]
    UnknownXpSource(String),

    #[error("Failed to persist progression state: {0}")]
    PersistenceFailed(String),

    #[error("Multiplier factor must be a positive number, got {0}")]
    InvalidMultiplier(f64),
}

impl ProgressionError {
    /// Wrap a storage error, keeping the whole context chain
    pub fn persistence(err: &anyhow::Error) -> Self {
        ProgressionError::PersistenceFailed(format!("{:#}", err))
    }
}
