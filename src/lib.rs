//! shengji - Personal fitness progression tracker
//!
//! 升级 (shēngjí) - "level up"

pub mod achievements;
pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod level;
pub mod tracker;
pub mod tui;
pub mod workouts;

pub use config::EngineConfig;
pub use db::Database;
pub use error::ProgressionError;
pub use level::ProgressionEngine;
pub use tracker::Tracker;
