//! Health and system status endpoints.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// `GET /api/health`: Liveness check, no dependencies touched.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: crate::config::APP_VERSION,
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
pub struct SystemStatusResponse {
    pub ai_available: bool,
    pub ai_model: String,
    pub total_patients: i64,
    pub total_assessments: i64,
    pub total_chat_messages: i64,
    pub timestamp: DateTime<Utc>,
}

/// `GET /api/system-status`: Generation availability and record counts.
pub async fn system_status(
    State(ctx): State<ApiContext>,
) -> Result<Json<SystemStatusResponse>, ApiError> {
    let ai_available = ctx.generator.probe().await;

    let (total_patients, total_assessments, total_chat_messages) = ctx
        .db
        .call(|conn| {
            Ok::<_, db::DatabaseError>((
                db::count_patients(conn)?,
                db::count_assessments(conn)?,
                db::count_chat_messages(conn)?,
            ))
        })
        .await?;

    Ok(Json(SystemStatusResponse {
        ai_available,
        ai_model: ctx.generation.model.clone(),
        total_patients,
        total_assessments,
        total_chat_messages,
        timestamp: Utc::now(),
    }))
}
