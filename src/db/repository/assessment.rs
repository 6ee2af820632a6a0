use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{decode_list, encode_list, optional};
use crate::db::DatabaseError;
use crate::models::*;

const ASSESSMENT_COLUMNS: &str = "id, session_id, patient_id, symptom_category, primary_symptom,
     severity, duration, additional_symptoms, ai_response, urgency_level, recommendations,
     confidence_score, assessment_duration, ai_model_used, reviewed_by_staff, staff_notes,
     created_at, updated_at";

pub fn insert_assessment(
    conn: &Connection,
    new: &NewAssessment,
    now: DateTime<Utc>,
) -> Result<Assessment, DatabaseError> {
    conn.execute(
        "INSERT INTO triage_assessments (session_id, patient_id, symptom_category, primary_symptom,
         severity, duration, additional_symptoms, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            new.session_id,
            new.patient_id,
            new.symptom_category.as_str(),
            new.primary_symptom,
            new.severity,
            new.duration,
            encode_list(&new.additional_symptoms)?,
            now,
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_assessment(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Assessment".into(),
        id: id.to_string(),
    })
}

pub fn get_assessment(conn: &Connection, id: i64) -> Result<Option<Assessment>, DatabaseError> {
    let row = optional(conn.query_row(
        &format!("SELECT {ASSESSMENT_COLUMNS} FROM triage_assessments WHERE id = ?1"),
        params![id],
        assessment_row,
    ))?;
    row.map(assessment_from_row).transpose()
}

/// Attach a generated response to assessment `id`.
///
/// Writing the same response twice leaves the row as after the first
/// write (apart from `updated_at`). Duration and confidence are only
/// touched when supplied.
pub fn update_assessment_response(
    conn: &Connection,
    id: i64,
    response: &AssessmentResponse,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE triage_assessments SET
            ai_response = ?2,
            urgency_level = ?3,
            recommendations = ?4,
            ai_model_used = ?5,
            assessment_duration = COALESCE(?6, assessment_duration),
            confidence_score = COALESCE(?7, confidence_score),
            updated_at = ?8
         WHERE id = ?1",
        params![
            id,
            response.ai_response,
            response.urgency_level.as_str(),
            response.recommendations,
            response.ai_model_used,
            response.assessment_duration,
            response.confidence_score,
            now,
        ],
    )?;

    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Assessment".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Most recent assessments first, joined with the owning patient.
pub fn list_recent_assessments(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<AssessmentSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, p.first_name, p.last_name, p.age, a.symptom_category, a.primary_symptom,
         a.severity, a.urgency_level, a.reviewed_by_staff, a.created_at
         FROM triage_assessments a
         LEFT JOIN patients p ON p.id = a.patient_id
         ORDER BY a.created_at DESC, a.id DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        Ok(SummaryRow {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            age: row.get(3)?,
            symptom_category: row.get(4)?,
            primary_symptom: row.get(5)?,
            severity: row.get(6)?,
            urgency_level: row.get(7)?,
            reviewed_by_staff: row.get(8)?,
            created_at: row.get(9)?,
        })
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let row = row?;
        let patient_name = match (row.first_name, row.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            _ => None,
        };
        summaries.push(AssessmentSummary {
            id: row.id,
            patient_name,
            patient_age: row.age,
            symptom_category: SymptomCategory::from_str(&row.symptom_category)?,
            primary_symptom: row.primary_symptom,
            severity: row.severity,
            urgency_level: row
                .urgency_level
                .as_deref()
                .map(UrgencyLabel::from_str)
                .transpose()?,
            reviewed_by_staff: row.reviewed_by_staff,
            created_at: row.created_at,
        });
    }
    Ok(summaries)
}

pub fn count_assessments(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM triage_assessments", [], |row| row.get(0))?)
}

struct SummaryRow {
    id: i64,
    first_name: Option<String>,
    last_name: Option<String>,
    age: Option<u32>,
    symptom_category: String,
    primary_symptom: String,
    severity: u8,
    urgency_level: Option<String>,
    reviewed_by_staff: bool,
    created_at: DateTime<Utc>,
}

struct AssessmentRow {
    id: i64,
    session_id: String,
    patient_id: i64,
    symptom_category: String,
    primary_symptom: String,
    severity: u8,
    duration: String,
    additional_symptoms: String,
    ai_response: Option<String>,
    urgency_level: Option<String>,
    recommendations: Option<String>,
    confidence_score: f64,
    assessment_duration: i64,
    ai_model_used: Option<String>,
    reviewed_by_staff: bool,
    staff_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn assessment_row(row: &Row<'_>) -> rusqlite::Result<AssessmentRow> {
    Ok(AssessmentRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        patient_id: row.get(2)?,
        symptom_category: row.get(3)?,
        primary_symptom: row.get(4)?,
        severity: row.get(5)?,
        duration: row.get(6)?,
        additional_symptoms: row.get(7)?,
        ai_response: row.get(8)?,
        urgency_level: row.get(9)?,
        recommendations: row.get(10)?,
        confidence_score: row.get(11)?,
        assessment_duration: row.get(12)?,
        ai_model_used: row.get(13)?,
        reviewed_by_staff: row.get(14)?,
        staff_notes: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn assessment_from_row(row: AssessmentRow) -> Result<Assessment, DatabaseError> {
    Ok(Assessment {
        id: row.id,
        session_id: row.session_id,
        patient_id: row.patient_id,
        symptom_category: SymptomCategory::from_str(&row.symptom_category)?,
        primary_symptom: row.primary_symptom,
        severity: row.severity,
        duration: row.duration,
        additional_symptoms: decode_list(&row.additional_symptoms),
        ai_response: row.ai_response,
        urgency_level: row
            .urgency_level
            .as_deref()
            .map(UrgencyLabel::from_str)
            .transpose()?,
        recommendations: row.recommendations,
        confidence_score: row.confidence_score,
        assessment_duration: row.assessment_duration,
        ai_model_used: row.ai_model_used,
        reviewed_by_staff: row.reviewed_by_staff,
        staff_notes: row.staff_notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
