//! Relaying generation events to the client as a live event stream.
//!
//! One relay serves both chat turns and assessments; the record kind only
//! matters to the persister. Text is accumulated while chunks are forwarded,
//! and the persister runs once, on `Done`, with the complete text.
//!
//! ```text
//! Streaming ──TextChunk──▶ Streaming
//!     │ Done  → persist, emit {"done":true}
//!     │ Error → discard text, record event, emit {"error":..}
//!     ▼
//! Closing ──▶ emit [DONE] ──▶ Finished
//! ```

use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::json;

use super::generation::{GenerationEvent, UNEXPECTED_ERROR};
use super::persist::{CompletedResponse, PersistTarget, ResponsePersister};
use crate::db::SystemEvent;
use crate::models::EventLevel;

/// One outbound event of the live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Chunk(String),
    Done,
    Error(String),
    /// Always the last event.
    EndOfStream,
}

impl RelayEvent {
    /// The `data:` payload of this event.
    pub fn data(&self) -> String {
        match self {
            Self::Chunk(text) => json!({ "chunk": text }).to_string(),
            Self::Done => json!({ "done": true }).to_string(),
            Self::Error(message) => json!({ "error": message }).to_string(),
            Self::EndOfStream => "[DONE]".to_string(),
        }
    }
}

enum RelayState {
    Streaming {
        events: BoxStream<'static, GenerationEvent>,
        accumulated: String,
        chunks: usize,
    },
    Closing,
    Finished,
}

struct Relay {
    state: RelayState,
    outcome: OutcomeWriter,
}

/// Everything needed to act on a terminal event.
struct OutcomeWriter {
    persister: Arc<dyn ResponsePersister>,
    target: PersistTarget,
    session_id: Option<String>,
    started: Instant,
}

/// Relay `events` to the client, persisting the complete text on `Done`.
///
/// `started` is when the request began; persisted latency is measured from
/// it. Persistence failures are logged and never reach the client.
pub fn relay_stream(
    events: BoxStream<'static, GenerationEvent>,
    persister: Arc<dyn ResponsePersister>,
    target: PersistTarget,
    session_id: Option<String>,
    started: Instant,
) -> BoxStream<'static, RelayEvent> {
    let relay = Relay {
        state: RelayState::Streaming {
            events,
            accumulated: String::new(),
            chunks: 0,
        },
        outcome: OutcomeWriter {
            persister,
            target,
            session_id,
            started,
        },
    };

    stream::unfold(relay, |mut relay| async move {
        match std::mem::replace(&mut relay.state, RelayState::Finished) {
            RelayState::Finished => None,
            RelayState::Closing => Some((RelayEvent::EndOfStream, relay)),
            RelayState::Streaming {
                mut events,
                mut accumulated,
                chunks,
            } => {
                let next = events.next().await;
                let out = match next {
                    Some(GenerationEvent::TextChunk(text)) => {
                        accumulated.push_str(&text);
                        relay.state = RelayState::Streaming {
                            events,
                            accumulated,
                            chunks: chunks + 1,
                        };
                        return Some((RelayEvent::Chunk(text), relay));
                    }
                    Some(GenerationEvent::Done) => {
                        drop(events);
                        relay.outcome.complete(accumulated, chunks).await;
                        RelayEvent::Done
                    }
                    Some(GenerationEvent::Error(message)) => {
                        drop(events);
                        relay.outcome.fail(&message).await;
                        RelayEvent::Error(message)
                    }
                    None => {
                        relay.outcome.fail(UNEXPECTED_ERROR).await;
                        RelayEvent::Error(UNEXPECTED_ERROR.to_string())
                    }
                };
                relay.state = RelayState::Closing;
                Some((out, relay))
            }
        }
    })
    .boxed()
}

impl OutcomeWriter {
    async fn complete(&self, text: String, chunks: usize) {
        let response = CompletedResponse {
            text,
            elapsed: Some(self.started.elapsed()),
            chunks,
        };
        let persister = Arc::clone(&self.persister);
        let target = self.target;
        let result =
            tokio::task::spawn_blocking(move || persister.persist(&target, &response)).await;

        match result {
            Ok(Ok(outcome)) => {
                tracing::info!(
                    kind = %self.target.kind(),
                    record_id = self.target.record_id(),
                    ?outcome,
                    "Generated response stored"
                );
            }
            Ok(Err(e)) => {
                tracing::error!(
                    kind = %self.target.kind(),
                    record_id = self.target.record_id(),
                    error = %e,
                    "Failed to store generated response"
                );
                self.record(EventLevel::Error, format!("Failed to save AI response: {e}"))
                    .await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Persist task failed");
            }
        }
    }

    async fn fail(&self, message: &str) {
        tracing::warn!(
            kind = %self.target.kind(),
            record_id = self.target.record_id(),
            error = %message,
            "Generation stream ended with an error"
        );
        self.record(EventLevel::Error, format!("AI streaming error: {message}"))
            .await;
    }

    async fn record(&self, level: EventLevel, message: String) {
        let mut event = SystemEvent::new(level, self.target.kind().as_str(), message);
        if let Some(session) = &self.session_id {
            event = event.with_session(session.clone());
        }
        let persister = Arc::clone(&self.persister);
        if let Err(e) = tokio::task::spawn_blocking(move || persister.record_event(&event)).await {
            tracing::warn!(error = %e, "System event task failed");
        }
    }
}
