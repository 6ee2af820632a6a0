use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::db::DatabaseError;
use crate::models::EventLevel;

/// An operational event worth keeping next to the data it concerns.
#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    pub level: EventLevel,
    pub message: String,
    pub module: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SystemEvent {
    pub fn new(level: EventLevel, module: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            module: Some(module.to_string()),
            session_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

pub fn insert_system_event(conn: &Connection, event: &SystemEvent) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO system_logs (level, message, module, session_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.level.as_str(),
            event.message,
            event.module,
            event.session_id,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_system_events(conn: &Connection, level: EventLevel) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM system_logs WHERE level = ?1",
        params![level.as_str()],
        |row| row.get(0),
    )?)
}
