//! Database module - storage ports and their SQLite / in-memory adapters

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};

use crate::workouts::{MAX_HISTORY_ITEMS, WorkoutSession};

/// Key of the progression state blob
pub const LEVEL_DATA_KEY: &str = "levelData";
/// Where an unreadable progression blob is kept before starting fresh
pub const LEVEL_DATA_BACKUP_KEY: &str = "levelData.corrupt";
/// Key of the user statistics blob
pub const USER_STATS_KEY: &str = "user_stats";
/// Key of the achievement book blob
pub const ACHIEVEMENTS_KEY: &str = "achievements";

/// Durable key-value storage for JSON blobs
pub trait StateStore {
    fn load_blob(&self, key: &str) -> Result<Option<String>>;
    fn save_blob(&mut self, key: &str, value: &str) -> Result<()>;
}

/// Workout history storage, newest first
pub trait WorkoutLog {
    /// Store a session, keeping only the most recent `MAX_HISTORY_ITEMS`
    fn add_workout(&mut self, session: &WorkoutSession) -> Result<i64>;
    fn get_workouts(&self) -> Result<Vec<WorkoutSession>>;
    /// Replace the whole history (import)
    fn replace_workouts(&mut self, sessions: &[WorkoutSession]) -> Result<()>;
}

/// Database wrapper
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("opening database {}", path))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self { conn: Connection::open_in_memory()? };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS workouts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workout_id TEXT NOT NULL,
                workout_name TEXT NOT NULL,
                date TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                ended_ts INTEGER NOT NULL,
                duration_minutes INTEGER NOT NULL,
                calories INTEGER NOT NULL,
                completed INTEGER NOT NULL,
                exercises TEXT NOT NULL DEFAULT '[]'
            )",
            [],
        )?;

        Ok(())
    }

    /// Drop everything but the most recent `keep` sessions
    fn trim_workouts(conn: &Connection, keep: usize) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM workouts WHERE id NOT IN (
                SELECT id FROM workouts ORDER BY ended_ts DESC, id DESC LIMIT ?1
            )",
            params![keep as i64],
        )?;
        Ok(removed)
    }
}

fn insert_workout(conn: &Connection, session: &WorkoutSession) -> Result<i64> {
    conn.execute(
        "INSERT INTO workouts (workout_id, workout_name, date, started_at, ended_at, ended_ts, duration_minutes, calories, completed, exercises) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            session.workout_id,
            session.workout_name,
            session.date.to_string(),
            session.started_at.to_rfc3339(),
            session.ended_at.to_rfc3339(),
            session.ended_at.timestamp(),
            session.duration_minutes,
            session.calories,
            session.completed,
            serde_json::to_string(&session.exercises)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl StateStore for Database {
    fn load_blob(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn save_blob(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value],
            )
            .with_context(|| format!("saving {}", key))?;
        Ok(())
    }
}

impl WorkoutLog for Database {
    fn add_workout(&mut self, session: &WorkoutSession) -> Result<i64> {
        let id = insert_workout(&self.conn, session)?;
        Self::trim_workouts(&self.conn, MAX_HISTORY_ITEMS)?;
        Ok(id)
    }

    fn get_workouts(&self) -> Result<Vec<WorkoutSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workout_id, workout_name, date, started_at, ended_at, duration_minutes, calories, completed, exercises FROM workouts ORDER BY ended_ts DESC, id DESC"
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, u32>(6)?,
                    row.get::<_, u32>(7)?,
                    row.get::<_, bool>(8)?,
                    row.get::<_, String>(9)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, workout_id, workout_name, date, started_at, ended_at, duration_minutes, calories, completed, exercises)|
                 -> Result<WorkoutSession> {
                    Ok(WorkoutSession {
                        id: Some(id),
                        workout_id,
                        workout_name,
                        date: date.parse::<NaiveDate>().with_context(|| format!("workout {} date", id))?,
                        started_at: DateTime::parse_from_rfc3339(&started_at)?,
                        ended_at: DateTime::parse_from_rfc3339(&ended_at)?,
                        duration_minutes,
                        exercises: serde_json::from_str(&exercises).with_context(|| format!("workout {} exercises", id))?,
                        calories,
                        completed,
                    })
                },
            )
            .collect()
    }

    fn replace_workouts(&mut self, sessions: &[WorkoutSession]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM workouts", [])?;

        // Oldest first so ids follow chronology
        let mut ordered: Vec<&WorkoutSession> = sessions.iter().collect();
        ordered.sort_by_key(|s| s.ended_at);
        for session in ordered {
            insert_workout(&tx, session)?;
        }
        Self::trim_workouts(&tx, MAX_HISTORY_ITEMS)?;
        tx.commit()?;
        Ok(())
    }
}

/// In-memory storage for tests and dry runs.
///
/// `fail_writes` makes every blob write fail, which simulates a full disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, String>,
    workouts: Vec<WorkoutSession>,
    next_id: i64,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail_writes: true, ..Self::default() }
    }
}

impl StateStore for MemoryStore {
    fn load_blob(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn save_blob(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("storage quota exceeded while saving {}", key);
        }
        self.blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl WorkoutLog for MemoryStore {
    fn add_workout(&mut self, session: &WorkoutSession) -> Result<i64> {
        self.next_id += 1;
        let mut stored = session.clone();
        stored.id = Some(self.next_id);
        self.workouts.insert(0, stored);
        self.workouts.truncate(MAX_HISTORY_ITEMS);
        Ok(self.next_id)
    }

    fn get_workouts(&self) -> Result<Vec<WorkoutSession>> {
        Ok(self.workouts.clone())
    }

    fn replace_workouts(&mut self, sessions: &[WorkoutSession]) -> Result<()> {
        self.workouts.clear();
        let mut ordered = sessions.to_vec();
        ordered.sort_by_key(|s| s.ended_at);
        for session in &ordered {
            self.add_workout(session)?;
        }
        Ok(())
    }
}
