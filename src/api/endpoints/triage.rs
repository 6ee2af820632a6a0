//! Structured symptom triage: submit, stream the assessment, save.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{int_field, log_event, require_generator, required_text, sse_response};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::db::{self, SystemEvent};
use crate::models::{
    EventLevel, NewAssessment, PatientProfile, SymptomCategory, UrgencyGuidance, UrgencyLabel,
};
use crate::pipeline::generation::GenerationRequest;
use crate::pipeline::persist::{CompletedResponse, PersistOutcome, PersistTarget};
use crate::pipeline::prompt::build_triage_prompt;
use crate::pipeline::relay::relay_stream;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub category: Option<String>,
    pub primary_symptom: Option<String>,
    pub severity: Option<serde_json::Value>,
    pub duration: Option<String>,
    #[serde(default)]
    pub additional_symptoms: Vec<String>,
}

/// Validated symptom fields, before a patient is attached.
#[derive(Debug)]
struct ValidSubmission {
    category: SymptomCategory,
    primary_symptom: String,
    severity: u8,
    duration: String,
    additional_symptoms: Vec<String>,
}

impl SubmitRequest {
    fn validate(self) -> Result<ValidSubmission, ApiError> {
        let category = required_text(self.category.as_deref(), "category")?
            .parse::<SymptomCategory>()
            .map_err(|_| ApiError::BadRequest("Invalid symptom category".into()))?;
        let primary_symptom = required_text(self.primary_symptom.as_deref(), "primarySymptom")?;

        let severity = int_field(self.severity.as_ref(), "severity")?;
        if !(1..=10).contains(&severity) {
            return Err(ApiError::BadRequest(
                "Severity must be between 1 and 10".into(),
            ));
        }

        let duration = required_text(self.duration.as_deref(), "duration")?;

        Ok(ValidSubmission {
            category,
            primary_symptom,
            severity: severity as u8,
            duration,
            additional_symptoms: self
                .additional_symptoms
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub assessment_id: i64,
    pub session_id: String,
    pub emergency: bool,
}

/// `POST /api/triage/submit`: Create an assessment for the session's patient.
pub async fn submit(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    require_generator(&ctx, "triage").await?;
    let valid = req.validate()?;

    let session_id = session.id.clone();
    let patient = ctx
        .db
        .call(move |conn| db::get_patient_by_session(conn, &session_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Patient not found".into()))?;

    let emergency = ctx.keywords.detect(&valid.primary_symptom);
    if emergency {
        tracing::warn!(session_id = %session.id, "Emergency keywords detected in triage submission");
        log_event(
            &ctx,
            SystemEvent::new(
                EventLevel::Warning,
                "triage",
                "Emergency keywords detected in triage submission",
            )
            .with_session(session.id.clone()),
        )
        .await;
    }

    let new_assessment = NewAssessment {
        session_id: session.id.clone(),
        patient_id: patient.id,
        symptom_category: valid.category,
        primary_symptom: valid.primary_symptom,
        severity: valid.severity,
        duration: valid.duration,
        additional_symptoms: valid.additional_symptoms,
    };
    let assessment = ctx
        .db
        .call(move |conn| db::insert_assessment(conn, &new_assessment, Utc::now()))
        .await?;

    tracing::info!(
        assessment_id = assessment.id,
        category = %assessment.symptom_category,
        severity = assessment.severity,
        "Triage assessment created"
    );

    Ok(Json(SubmitResponse {
        success: true,
        assessment_id: assessment.id,
        session_id: session.id,
        emergency,
    }))
}

/// `GET /api/triage/stream/:assessment_id`: Stream the generated assessment.
pub async fn stream_assessment(
    State(ctx): State<ApiContext>,
    Path(assessment_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();
    let (assessment, patient) = ctx
        .db
        .call(move |conn| {
            let Some(assessment) = db::get_assessment(conn, assessment_id)? else {
                return Ok::<_, db::DatabaseError>(None);
            };
            let patient = db::get_patient(conn, assessment.patient_id)?;
            Ok(Some((assessment, patient)))
        })
        .await?
        .ok_or_else(|| ApiError::NotFound("Assessment not found".into()))?;

    let profile = patient
        .map(|p| p.profile())
        .unwrap_or_else(PatientProfile::default);
    let prompt = build_triage_prompt(&profile, &assessment.symptoms(), &ctx.keywords);
    let events = ctx
        .generator
        .generate(GenerationRequest::new(&ctx.generation, prompt));

    tracing::info!(assessment_id, model = %ctx.generation.model, "Streaming triage assessment");

    Ok(sse_response(relay_stream(
        events,
        ctx.persister.clone(),
        PersistTarget::Assessment {
            assessment_id,
            confidence: None,
        },
        Some(assessment.session_id),
        started,
    )))
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub response: String,
    pub confidence_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub assessment_id: i64,
    pub urgency_level: UrgencyLabel,
    pub guidance: UrgencyGuidance,
}

/// `POST /api/triage/save/:assessment_id`: Store a client-supplied response.
pub async fn save(
    State(ctx): State<ApiContext>,
    Path(assessment_id): Path<i64>,
    Json(req): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, ApiError> {
    if let Some(score) = req.confidence_score {
        if !(0.0..=1.0).contains(&score) {
            return Err(ApiError::BadRequest(
                "confidence_score must be between 0 and 1".into(),
            ));
        }
    }

    let target = PersistTarget::Assessment {
        assessment_id,
        confidence: req.confidence_score,
    };
    let response = CompletedResponse {
        text: req.response,
        elapsed: None,
        chunks: 0,
    };

    let persister = ctx.persister.clone();
    let outcome = tokio::task::spawn_blocking(move || persister.persist(&target, &response))
        .await
        .map_err(|e| ApiError::Internal(format!("persist task: {e}")))??;

    let urgency = match outcome {
        PersistOutcome::Assessment { urgency } => urgency,
        PersistOutcome::ChatReply { .. } => {
            return Err(ApiError::Internal("unexpected persist outcome".into()))
        }
    };

    tracing::info!(assessment_id, urgency = %urgency, "Triage response saved");

    Ok(Json(SaveResponse {
        success: true,
        assessment_id,
        urgency_level: urgency,
        guidance: urgency.guidance(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> SubmitRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn valid_submission() {
        let valid = request(json!({
            "category": "respiratory",
            "primarySymptom": "cough",
            "severity": "4",
            "duration": "2 days",
            "additionalSymptoms": ["fever", ""]
        }))
        .validate()
        .unwrap();
        assert_eq!(valid.category, SymptomCategory::Respiratory);
        assert_eq!(valid.severity, 4);
        assert_eq!(valid.additional_symptoms, vec!["fever".to_string()]);
    }

    #[test]
    fn severity_out_of_range_is_rejected() {
        for severity in [0, 11] {
            let err = request(json!({
                "category": "pain",
                "primarySymptom": "knee",
                "severity": severity,
                "duration": "1 week"
            }))
            .validate()
            .unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(m) if m == "Severity must be between 1 and 10"));
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = request(json!({
            "category": "cardiac",
            "primarySymptom": "palpitations",
            "severity": 5,
            "duration": "today"
        }))
        .validate()
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "Invalid symptom category"));
    }

    #[test]
    fn missing_duration_is_reported() {
        let err = request(json!({
            "category": "skin",
            "primarySymptom": "rash",
            "severity": 2
        }))
        .validate()
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(m) if m == "duration is required"));
    }
}
