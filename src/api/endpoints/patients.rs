//! Patient registration.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{int_field, optional_text, required_text};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, SessionContext};
use crate::db;
use crate::models::{Gender, NewPatient};

const REGISTRABLE_GENDERS: [Gender; 4] = [
    Gender::Male,
    Gender::Female,
    Gender::Other,
    Gender::PreferNotToSay,
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<serde_json::Value>,
    pub gender: Option<String>,
    pub postcode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub existing_conditions: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    pub emergency_contact: Option<String>,
}

impl RegisterRequest {
    fn validate(self) -> Result<NewPatient, ApiError> {
        let first_name = required_text(self.first_name.as_deref(), "firstName")?;
        let last_name = required_text(self.last_name.as_deref(), "lastName")?;

        let age = int_field(self.age.as_ref(), "age")?;
        if !(1..=120).contains(&age) {
            return Err(ApiError::BadRequest("Age must be between 1 and 120".into()));
        }

        let gender_raw = required_text(self.gender.as_deref(), "gender")?;
        let gender = gender_raw
            .parse::<Gender>()
            .ok()
            .filter(|g| REGISTRABLE_GENDERS.contains(g))
            .ok_or_else(|| ApiError::BadRequest("Invalid gender".into()))?;

        Ok(NewPatient {
            first_name,
            last_name,
            age: age as u32,
            gender,
            postcode: optional_text(self.postcode),
            phone: optional_text(self.phone),
            email: optional_text(self.email),
            existing_conditions: clean_list(self.existing_conditions),
            current_medications: clean_list(self.current_medications),
            allergies: clean_list(self.allergies),
            emergency_contact: optional_text(self.emergency_contact),
        })
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect()
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub patient_id: i64,
    pub session_id: String,
}

/// `POST /api/patient/register`: Create or update the session's patient.
pub async fn register(
    State(ctx): State<ApiContext>,
    Extension(session): Extension<SessionContext>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let new_patient = req.validate()?;

    let session_id = session.id.clone();
    let patient = ctx
        .db
        .call(move |conn| db::upsert_patient(conn, &session_id, &new_patient, Utc::now()))
        .await?;

    tracing::info!(patient_id = patient.id, session_id = %session.id, "Patient registered");

    Ok(Json(RegisterResponse {
        success: true,
        patient_id: patient.id,
        session_id: session.id,
    }))
}
