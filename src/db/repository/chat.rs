use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::optional;
use crate::db::DatabaseError;
use crate::models::*;

const MESSAGE_COLUMNS: &str =
    "id, session_id, patient_id, message, role, tokens_used, response_time, reply_to, created_at";

pub fn insert_chat_message(
    conn: &Connection,
    msg: &NewChatMessage,
    now: DateTime<Utc>,
) -> Result<ChatMessage, DatabaseError> {
    conn.execute(
        "INSERT INTO chat_messages (session_id, patient_id, message, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            msg.session_id,
            msg.patient_id,
            msg.message,
            msg.role.as_str(),
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_chat_message(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "ChatMessage".into(),
        id: id.to_string(),
    })
}

pub fn get_chat_message(conn: &Connection, id: i64) -> Result<Option<ChatMessage>, DatabaseError> {
    let row = optional(conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = ?1"),
        params![id],
        message_row,
    ))?;
    row.map(message_from_row).transpose()
}

/// The assistant reply stored for user turn `message_id`, if any.
pub fn get_reply_to(conn: &Connection, message_id: i64) -> Result<Option<ChatMessage>, DatabaseError> {
    let row = optional(conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE reply_to = ?1"),
        params![message_id],
        message_row,
    ))?;
    row.map(message_from_row).transpose()
}

/// Write the assistant reply to `user_turn`.
///
/// A second write for the same turn overwrites the first, so at most one
/// reply row exists per user turn. Returns the reply's id.
pub fn upsert_assistant_reply(
    conn: &Connection,
    user_turn: &ChatMessage,
    text: &str,
    tokens_used: i64,
    response_time: f64,
    now: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    let id = conn.query_row(
        "INSERT INTO chat_messages (session_id, patient_id, message, role, tokens_used,
         response_time, reply_to, created_at)
         VALUES (?1, ?2, ?3, 'assistant', ?4, ?5, ?6, ?7)
         ON CONFLICT(reply_to) DO UPDATE SET
            message = excluded.message,
            tokens_used = excluded.tokens_used,
            response_time = excluded.response_time
         RETURNING id",
        params![
            user_turn.session_id,
            user_turn.patient_id,
            text,
            tokens_used,
            response_time,
            user_turn.id,
            now,
        ],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(id)
}

/// User turns stored for `session_id` at or after `since`.
pub fn count_user_messages_since(
    conn: &Connection,
    session_id: &str,
    since: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM chat_messages
         WHERE session_id = ?1 AND role = 'user' AND created_at >= ?2",
        params![session_id, since],
        |row| row.get(0),
    )?)
}

pub fn count_chat_messages(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))?)
}

/// Returns the number of rows removed, replies to removed turns included.
pub fn delete_chat_messages_before(
    conn: &Connection,
    cutoff: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let before = count_chat_messages(conn)?;
    conn.execute("DELETE FROM chat_messages WHERE created_at < ?1", params![cutoff])?;
    let after = count_chat_messages(conn)?;
    Ok((before - after) as usize)
}

struct MessageRow {
    id: i64,
    session_id: String,
    patient_id: Option<i64>,
    message: String,
    role: String,
    tokens_used: i64,
    response_time: f64,
    reply_to: Option<i64>,
    created_at: DateTime<Utc>,
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        patient_id: row.get(2)?,
        message: row.get(3)?,
        role: row.get(4)?,
        tokens_used: row.get(5)?,
        response_time: row.get(6)?,
        reply_to: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn message_from_row(row: MessageRow) -> Result<ChatMessage, DatabaseError> {
    Ok(ChatMessage {
        id: row.id,
        session_id: row.session_id,
        patient_id: row.patient_id,
        message: row.message,
        role: MessageRole::from_str(&row.role)?,
        tokens_used: row.tokens_used,
        response_time: row.response_time,
        reply_to: row.reply_to,
        created_at: row.created_at,
    })
}
