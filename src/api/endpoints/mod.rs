//! Endpoint handlers, one module per resource.

pub mod chat;
pub mod health;
pub mod patients;
pub mod staff;
pub mod triage;

use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures_util::stream::{BoxStream, Stream, StreamExt};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::{self, SystemEvent};
use crate::models::EventLevel;
use crate::pipeline::relay::RelayEvent;

/// Fail with 503 when the generation backend does not answer its probe.
pub(crate) async fn require_generator(ctx: &ApiContext, module: &str) -> Result<(), ApiError> {
    if ctx.generator.probe().await {
        return Ok(());
    }
    tracing::warn!(module, "Generation service unavailable");
    log_event(ctx, SystemEvent::new(EventLevel::Error, module, "AI service unavailable")).await;
    Err(ApiError::ServiceUnavailable("AI service unavailable".into()))
}

/// Best-effort system event write; failures are only logged.
pub(crate) async fn log_event(ctx: &ApiContext, event: SystemEvent) {
    if let Err(e) = ctx
        .db
        .call(move |conn| db::insert_system_event(conn, &event))
        .await
    {
        tracing::warn!(error = %e, "Failed to store system event");
    }
}

/// Wrap relay output as a server-sent event response.
pub(crate) fn sse_response(
    events: BoxStream<'static, RelayEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(events.map(|event| Ok::<_, Infallible>(Event::default().data(event.data()))))
}

/// Parse an integer field that may arrive as a JSON number or numeric string.
pub(crate) fn int_field(value: Option<&serde_json::Value>, name: &str) -> Result<i64, ApiError> {
    let invalid = || ApiError::BadRequest(format!("{name} must be a valid number"));
    match value {
        None | Some(serde_json::Value::Null) => Err(ApiError::BadRequest(format!("{name} is required"))),
        Some(serde_json::Value::Number(n)) => n.as_i64().ok_or_else(invalid),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => {
            Err(ApiError::BadRequest(format!("{name} is required")))
        }
        Some(serde_json::Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// A required, non-blank text field.
pub(crate) fn required_text(value: Option<&str>, name: &str) -> Result<String, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
}

/// An optional text field; blank counts as absent.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
