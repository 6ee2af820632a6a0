//! Staff read view over recent assessments.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::{AssessmentSummary, UrgencyGuidance};

pub const STAFF_VIEW_LIMIT: u32 = 50;

#[derive(Debug, Serialize)]
pub struct StaffAssessment {
    #[serde(flatten)]
    pub summary: AssessmentSummary,
    pub category_name: &'static str,
    pub guidance: Option<UrgencyGuidance>,
}

#[derive(Debug, Serialize)]
pub struct StaffAssessmentsResponse {
    pub assessments: Vec<StaffAssessment>,
    pub total: usize,
}

/// `GET /api/staff/assessments`: Latest assessments, newest first.
pub async fn list_assessments(
    State(ctx): State<ApiContext>,
) -> Result<Json<StaffAssessmentsResponse>, ApiError> {
    let summaries = ctx
        .db
        .call(|conn| db::list_recent_assessments(conn, STAFF_VIEW_LIMIT))
        .await?;

    let assessments: Vec<StaffAssessment> = summaries
        .into_iter()
        .map(|summary| StaffAssessment {
            category_name: summary.symptom_category.display_name(),
            guidance: summary.urgency_level.map(|u| u.guidance()),
            summary,
        })
        .collect();

    Ok(Json(StaffAssessmentsResponse {
        total: assessments.len(),
        assessments,
    }))
}
