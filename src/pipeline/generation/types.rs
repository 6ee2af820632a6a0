use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;

// ──────────────────────────────────────────────
// Caller-safe error messages
// ──────────────────────────────────────────────

/// Upstream answered with a non-success status or reported an error.
pub const AI_SERVICE_ERROR: &str = "AI service error";
/// The whole-request deadline elapsed.
pub const REQUEST_TIMEOUT: &str = "Request timeout";
/// Any other transport fault, including a body that ends without `done`.
pub const UNEXPECTED_ERROR: &str = "Unexpected error";

/// One decoded step of a streaming generation.
///
/// Chunks arrive in generation order. `Done` and `Error` are terminal:
/// exactly one of them ends every sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    TextChunk(String),
    Done,
    /// Carries a caller-safe message, never upstream detail.
    Error(String),
}

impl GenerationEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::TextChunk(_))
    }
}

/// Sampling parameters sent under `options`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub top_p: f32,
}

/// Body of `POST /api/generate`. Built per call and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerationOptions,
    /// Deadline for the whole streaming request, not sent upstream.
    #[serde(skip)]
    pub timeout: Duration,
}

impl GenerationRequest {
    pub fn new(config: &GenerationConfig, prompt: impl Into<String>) -> Self {
        Self {
            model: config.model.clone(),
            prompt: prompt.into(),
            stream: true,
            options: GenerationOptions {
                temperature: config.temperature,
                top_p: config.top_p,
            },
            timeout: config.timeout,
        }
    }
}

/// One newline-delimited fragment of the `/api/generate` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateFragment {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Invalid generation endpoint URL: '{0}'")]
    InvalidUrl(String),

    #[error("HTTP client setup failed: {0}")]
    ClientBuild(String),
}

/// A backend that turns a prompt into a stream of [`GenerationEvent`]s.
pub trait TextGenerator: Send + Sync {
    /// Start one generation. The returned stream owns the upstream
    /// connection; dropping it closes the connection.
    fn generate(&self, request: GenerationRequest) -> BoxStream<'static, GenerationEvent>;

    /// Whether the backend is reachable right now.
    fn probe(&self) -> BoxFuture<'_, bool>;
}
