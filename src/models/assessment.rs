use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{SymptomCategory, UrgencyLabel};

/// Symptom data submitted for one assessment. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomInput {
    pub category: Option<SymptomCategory>,
    pub primary_symptom: Option<String>,
    /// 1-10.
    pub severity: Option<u8>,
    pub duration: Option<String>,
    #[serde(default)]
    pub additional_symptoms: Vec<String>,
}

/// A stored triage assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: i64,
    pub session_id: String,
    pub patient_id: i64,
    pub symptom_category: SymptomCategory,
    pub primary_symptom: String,
    pub severity: u8,
    pub duration: String,
    pub additional_symptoms: Vec<String>,
    pub ai_response: Option<String>,
    pub urgency_level: Option<UrgencyLabel>,
    pub recommendations: Option<String>,
    pub confidence_score: f64,
    /// Whole seconds from stream start to completion.
    pub assessment_duration: i64,
    pub ai_model_used: Option<String>,
    pub reviewed_by_staff: bool,
    pub staff_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assessment {
    pub fn symptoms(&self) -> SymptomInput {
        SymptomInput {
            category: Some(self.symptom_category),
            primary_symptom: Some(self.primary_symptom.clone()),
            severity: Some(self.severity),
            duration: Some(self.duration.clone()),
            additional_symptoms: self.additional_symptoms.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub session_id: String,
    pub patient_id: i64,
    pub symptom_category: SymptomCategory,
    pub primary_symptom: String,
    pub severity: u8,
    pub duration: String,
    pub additional_symptoms: Vec<String>,
}

/// Fields written when a generated response is attached to an assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentResponse {
    pub ai_response: String,
    pub urgency_level: UrgencyLabel,
    pub recommendations: String,
    pub ai_model_used: String,
    /// Whole seconds; `None` leaves the stored value untouched.
    pub assessment_duration: Option<i64>,
    /// `None` leaves the stored value untouched.
    pub confidence_score: Option<f64>,
}

/// Row of the staff read view.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentSummary {
    pub id: i64,
    pub patient_name: Option<String>,
    pub patient_age: Option<u32>,
    pub symptom_category: SymptomCategory,
    pub primary_symptom: String,
    pub severity: u8,
    pub urgency_level: Option<UrgencyLabel>,
    pub reviewed_by_staff: bool,
    pub created_at: DateTime<Utc>,
}
