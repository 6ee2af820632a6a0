//! HTTP API.
//!
//! JSON endpoints for registration, chat, triage, status and the staff
//! view, plus the two live streams. Callers identify their session with
//! `X-Session-Id`; the router is composable and mounted by `server`.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::triage_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
