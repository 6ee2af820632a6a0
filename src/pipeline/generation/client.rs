//! Streaming client for Ollama's `/api/generate`.
//!
//! The response body is newline-delimited JSON. Each call becomes a small
//! state machine driven by `stream::unfold`: connect, then read body chunks
//! and decode complete lines until a terminal event is produced. One
//! deadline bounds the whole request.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::time::{timeout_at, Instant};

use super::types::*;
use crate::config::validate_base_url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, GenerationError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        validate_base_url(&base_url).map_err(|_| GenerationError::InvalidUrl(base_url.clone()))?;

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::ClientBuild(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl TextGenerator for OllamaClient {
    fn generate(&self, request: GenerationRequest) -> BoxStream<'static, GenerationEvent> {
        tracing::debug!(model = %request.model, prompt_len = request.prompt.len(), "Starting generation");

        let fetch = Fetch {
            phase: Phase::Connect(
                self.http
                    .post(format!("{}/api/generate", self.base_url))
                    .json(&request),
            ),
            deadline: Instant::now() + request.timeout,
            timeout: request.timeout,
            lines: LineBuffer::default(),
            queued: VecDeque::new(),
        };

        stream::unfold(fetch, |mut fetch| async move {
            loop {
                if let Some(event) = fetch.queued.pop_front() {
                    return Some((event, fetch));
                }
                if matches!(fetch.phase, Phase::Closed) {
                    return None;
                }
                fetch.advance().await;
            }
        })
        .boxed()
    }

    fn probe(&self) -> BoxFuture<'_, bool> {
        async move {
            let url = format!("{}/api/version", self.base_url);
            match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
                Ok(response) => response.status().is_success(),
                Err(e) => {
                    tracing::debug!(error = %e, "Generation service probe failed");
                    false
                }
            }
        }
        .boxed()
    }
}

// ═══════════════════════════════════════════════════════════
// Fetch state machine
// ═══════════════════════════════════════════════════════════

enum Phase {
    Connect(reqwest::RequestBuilder),
    Receive(reqwest::Response),
    Closed,
}

struct Fetch {
    phase: Phase,
    deadline: Instant,
    timeout: Duration,
    lines: LineBuffer,
    queued: VecDeque<GenerationEvent>,
}

impl Fetch {
    /// Perform one I/O step, queueing any events it produced.
    async fn advance(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Closed => {}
            Phase::Connect(request) => match timeout_at(self.deadline, request.send()).await {
                Err(_) => self.timed_out(),
                Ok(Err(e)) => self.transport_failure(e),
                Ok(Ok(response)) if !response.status().is_success() => {
                    tracing::warn!(status = %response.status(), "Generation service returned an error status");
                    self.fail(AI_SERVICE_ERROR);
                }
                Ok(Ok(response)) => self.phase = Phase::Receive(response),
            },
            Phase::Receive(mut response) => match timeout_at(self.deadline, response.chunk()).await {
                Err(_) => self.timed_out(),
                Ok(Err(e)) => self.transport_failure(e),
                Ok(Ok(Some(bytes))) => {
                    let events: Vec<GenerationEvent> = self
                        .lines
                        .push(&bytes)
                        .iter()
                        .flat_map(|line| decode_line(line))
                        .collect();
                    self.phase = Phase::Receive(response);
                    self.enqueue(events);
                }
                Ok(Ok(None)) => {
                    let events = self
                        .lines
                        .finish()
                        .map(|line| decode_line(&line))
                        .unwrap_or_default();
                    if !self.enqueue(events) {
                        tracing::warn!("Generation stream ended without a done marker");
                        self.fail(UNEXPECTED_ERROR);
                    }
                }
            },
        }
    }

    /// Queue events up to and including the first terminal one.
    /// Returns true when a terminal event was queued.
    fn enqueue(&mut self, events: Vec<GenerationEvent>) -> bool {
        for event in events {
            let terminal = event.is_terminal();
            self.queued.push_back(event);
            if terminal {
                self.phase = Phase::Closed;
                return true;
            }
        }
        false
    }

    fn fail(&mut self, message: &str) {
        self.phase = Phase::Closed;
        self.queued.push_back(GenerationEvent::Error(message.to_string()));
    }

    fn timed_out(&mut self) {
        tracing::warn!(timeout_secs = self.timeout.as_secs(), "Generation request timed out");
        self.fail(REQUEST_TIMEOUT);
    }

    fn transport_failure(&mut self, e: reqwest::Error) {
        if e.is_timeout() {
            self.timed_out();
        } else {
            tracing::warn!(error = %e, "Generation transport failure");
            self.fail(UNEXPECTED_ERROR);
        }
    }
}

/// Reassembles newline-delimited lines across body chunks.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append `bytes` and return every line completed by them.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).into_owned());
        }
        lines
    }

    /// The unterminated remainder at end of body, if any.
    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Decode one body line into zero or more events.
///
/// Unparsable lines are skipped. A fragment can carry both a last piece
/// of text and `done`, in which case the chunk precedes `Done`.
fn decode_line(line: &str) -> Vec<GenerationEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let fragment: GenerateFragment = match serde_json::from_str(line) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed generation fragment");
            return Vec::new();
        }
    };

    if let Some(error) = fragment.error {
        tracing::warn!(error = %error, "Generation service reported an error");
        return vec![GenerationEvent::Error(AI_SERVICE_ERROR.to_string())];
    }

    let mut events = Vec::new();
    if let Some(text) = fragment.response.filter(|t| !t.is_empty()) {
        events.push(GenerationEvent::TextChunk(text));
    }
    if fragment.done {
        events.push(GenerationEvent::Done);
    }
    events
}
