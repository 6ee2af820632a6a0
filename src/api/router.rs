//! Triage API router.
//!
//! Returns a composable `Router` with every endpoint under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Session resolution → 3. Rate limiter → Handler
//!
//! `/api/health` sits outside the session and rate layers.

use axum::http::{header, HeaderName, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::{ApiContext, SESSION_HEADER};

/// Build the triage API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn triage_router(ctx: ApiContext) -> Router {
    // Live streams must not be buffered by proxies or cached.
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let streams = Router::new()
        .route("/chat/stream/:message_id", get(endpoints::chat::stream_reply))
        .route(
            "/triage/stream/:assessment_id",
            get(endpoints::triage::stream_assessment),
        )
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ));

    let limited = Router::new()
        .route("/system-status", get(endpoints::health::system_status))
        .route("/patient/register", post(endpoints::patients::register))
        .route("/chat", post(endpoints::chat::send_message))
        .route("/triage/submit", post(endpoints::triage::submit))
        .route("/triage/save/:assessment_id", post(endpoints::triage::save))
        .route("/staff/assessments", get(endpoints::staff::list_assessments))
        .merge(streams)
        .with_state(ctx.clone())
        // Innermost first: rate limiting reads the session set just outside it.
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::middleware::from_fn(middleware::session::resolve))
        .layer(axum::Extension(ctx));

    let open = Router::new().route("/health", get(endpoints::health::check));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_HEADER)]);

    Router::new()
        .nest("/api", limited)
        .nest("/api", open)
        .layer(cors)
}
