use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::MessageRole;

/// One turn of a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: String,
    pub patient_id: Option<i64>,
    pub message: String,
    pub role: MessageRole,
    pub tokens_used: i64,
    /// Seconds between stream start and completion (assistant turns).
    pub response_time: f64,
    /// For assistant turns, the user turn being answered.
    pub reply_to: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub session_id: String,
    pub patient_id: Option<i64>,
    pub message: String,
    pub role: MessageRole,
}
