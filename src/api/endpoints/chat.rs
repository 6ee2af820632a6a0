//! Conversational chat: store a user turn, then stream the reply.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{log_event, require_generator, sse_response};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::db::{self, SystemEvent};
use crate::models::{EventLevel, MessageRole, NewChatMessage};
use crate::pipeline::generation::GenerationRequest;
use crate::pipeline::persist::PersistTarget;
use crate::pipeline::prompt::build_chat_prompt;
use crate::pipeline::relay::relay_stream;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub message_id: i64,
    pub session_id: String,
    pub emergency: bool,
}

fn validate_message(raw: Option<String>) -> Result<String, ApiError> {
    let message = raw.map(|m| m.trim().to_string()).unwrap_or_default();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message too long (max {MAX_MESSAGE_CHARS} characters)"
        )));
    }
    Ok(message)
}

/// `POST /api/chat`: Validate and store a user turn.
pub async fn send_message(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = validate_message(req.message)?;
    require_generator(&ctx, "chat").await?;

    let now = Utc::now();
    check_chat_quota(&ctx, &session.id, now).await?;

    let emergency = ctx.keywords.detect(&message);
    if emergency {
        tracing::warn!(session_id = %session.id, "Emergency keywords detected in chat message");
        log_event(
            &ctx,
            SystemEvent::new(
                EventLevel::Warning,
                "chat",
                "Emergency keywords detected in chat message",
            )
            .with_session(session.id.clone()),
        )
        .await;
    }

    let session_id = session.id.clone();
    let stored = ctx
        .db
        .call(move |conn| {
            let patient = db::ensure_patient(conn, &session_id, now)?;
            db::insert_chat_message(
                conn,
                &NewChatMessage {
                    session_id,
                    patient_id: Some(patient.id),
                    message,
                    role: MessageRole::User,
                },
                now,
            )
        })
        .await?;

    tracing::info!(message_id = stored.id, session_id = %session.id, "Chat message stored");

    Ok(Json(ChatResponse {
        success: true,
        message_id: stored.id,
        session_id: session.id,
        emergency,
    }))
}

/// Reject the turn when the session already sent its quota of user
/// messages inside the configured window.
async fn check_chat_quota(
    ctx: &ApiContext,
    session_id: &str,
    now: chrono::DateTime<Utc>,
) -> Result<(), ApiError> {
    let window = ctx.rate_limits.chat_window;
    let since = chrono::Duration::from_std(window)
        .map(|w| now - w)
        .unwrap_or(now);

    let owned_session = session_id.to_string();
    let sent = match ctx
        .db
        .call(move |conn| db::count_user_messages_since(conn, &owned_session, since))
        .await
    {
        Ok(sent) => sent,
        Err(e) => {
            tracing::warn!(error = %e, "Chat quota check failed, allowing message");
            return Ok(());
        }
    };

    if sent >= i64::from(ctx.rate_limits.chat_messages) {
        tracing::warn!(session_id, sent, "Chat rate limit exceeded");
        return Err(ApiError::RateLimited {
            retry_after: window.as_secs(),
        });
    }
    Ok(())
}

/// `GET /api/chat/stream/:message_id`: Stream the assistant reply.
pub async fn stream_reply(
    State(ctx): State<ApiContext>,
    Path(message_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();
    let turn = ctx
        .db
        .call(move |conn| db::get_chat_message(conn, message_id))
        .await?
        .filter(|m| m.role == MessageRole::User)
        .ok_or_else(|| ApiError::NotFound("Message not found".into()))?;

    let prompt = build_chat_prompt(&turn.message, &ctx.keywords);
    let events = ctx
        .generator
        .generate(GenerationRequest::new(&ctx.generation, prompt));

    tracing::info!(message_id, model = %ctx.generation.model, "Streaming chat reply");

    Ok(sse_response(relay_stream(
        events,
        ctx.persister.clone(),
        PersistTarget::ChatTurn { message_id },
        Some(turn.session_id),
        started,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_validation() {
        assert!(matches!(
            validate_message(None),
            Err(ApiError::BadRequest(m)) if m == "Message cannot be empty"
        ));
        assert!(validate_message(Some("   ".into())).is_err());
        assert_eq!(validate_message(Some(" hi ".into())).unwrap(), "hi");

        let at_limit = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(validate_message(Some(at_limit)).is_ok());
        let over = "a".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(validate_message(Some(over)).is_err());
    }
}
