//! Session resolution middleware.
//!
//! Reads `X-Session-Id`, issues a fresh id when it is missing or malformed,
//! injects `SessionContext` for downstream handlers and echoes the id back
//! on the response.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{SessionContext, SESSION_HEADER};

pub async fn resolve(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let session = SessionContext::from_header(
        req.headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    if session.issued {
        tracing::debug!(session_id = %session.id, "Issued new session");
    }

    let id = session.id.clone();
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(SESSION_HEADER, val);
    }
    response
}
