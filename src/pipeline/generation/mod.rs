//! Text generation against a local Ollama instance.
//!
//! `TextGenerator` is the seam between the stream relay and the model
//! backend: production uses [`OllamaClient`], tests use scripted generators.

pub mod client;
pub mod types;

pub use client::*;
pub use types::*;
