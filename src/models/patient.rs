use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::Gender;

/// A stored patient, keyed by the browser session that registered it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub session_id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub gender: Gender,
    pub postcode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub existing_conditions: Vec<String>,
    pub current_medications: Vec<String>,
    pub allergies: Vec<String>,
    pub emergency_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// The clinical subset of this record used to build prompts.
    ///
    /// Anonymous placeholders store age 0 and gender `unknown`; both read
    /// back as absent.
    pub fn profile(&self) -> PatientProfile {
        PatientProfile {
            age: (self.age > 0).then_some(self.age),
            gender: (self.gender != Gender::Unknown).then_some(self.gender),
            existing_conditions: self.existing_conditions.clone(),
            current_medications: self.current_medications.clone(),
            allergies: self.allergies.clone(),
        }
    }
}

/// Registration or update data for the session's patient.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub gender: Gender,
    pub postcode: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub existing_conditions: Vec<String>,
    pub current_medications: Vec<String>,
    pub allergies: Vec<String>,
    pub emergency_contact: Option<String>,
}

impl NewPatient {
    /// Placeholder patient for sessions that chat before registering.
    pub fn anonymous() -> Self {
        Self {
            first_name: "Anonymous".into(),
            last_name: "User".into(),
            age: 0,
            gender: Gender::Unknown,
            postcode: None,
            phone: None,
            email: None,
            existing_conditions: Vec::new(),
            current_medications: Vec::new(),
            allergies: Vec::new(),
            emergency_contact: None,
        }
    }
}

/// Clinical profile fed to the prompt builder. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    #[serde(default)]
    pub existing_conditions: Vec<String>,
    #[serde(default)]
    pub current_medications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}
