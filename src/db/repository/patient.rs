use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{decode_list, encode_list, optional};
use crate::db::DatabaseError;
use crate::models::*;

const PATIENT_COLUMNS: &str = "id, session_id, first_name, last_name, age, gender, postcode, phone,
     email, existing_conditions, current_medications, allergies, emergency_contact,
     created_at, updated_at";

/// Create the session's patient, or overwrite it if one already exists.
pub fn upsert_patient(
    conn: &Connection,
    session_id: &str,
    patient: &NewPatient,
    now: DateTime<Utc>,
) -> Result<Patient, DatabaseError> {
    conn.execute(
        "INSERT INTO patients (session_id, first_name, last_name, age, gender, postcode, phone,
         email, existing_conditions, current_medications, allergies, emergency_contact,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
         ON CONFLICT(session_id) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            age = excluded.age,
            gender = excluded.gender,
            postcode = excluded.postcode,
            phone = excluded.phone,
            email = excluded.email,
            existing_conditions = excluded.existing_conditions,
            current_medications = excluded.current_medications,
            allergies = excluded.allergies,
            emergency_contact = excluded.emergency_contact,
            updated_at = excluded.updated_at",
        params![
            session_id,
            patient.first_name,
            patient.last_name,
            patient.age,
            patient.gender.as_str(),
            patient.postcode,
            patient.phone,
            patient.email,
            encode_list(&patient.existing_conditions)?,
            encode_list(&patient.current_medications)?,
            encode_list(&patient.allergies)?,
            patient.emergency_contact,
            now,
        ],
    )?;

    get_patient_by_session(conn, session_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Patient".into(),
        id: session_id.into(),
    })
}

/// The session's patient, creating an anonymous placeholder if none exists.
pub fn ensure_patient(
    conn: &Connection,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<Patient, DatabaseError> {
    if let Some(existing) = get_patient_by_session(conn, session_id)? {
        return Ok(existing);
    }
    upsert_patient(conn, session_id, &NewPatient::anonymous(), now)
}

pub fn get_patient(conn: &Connection, id: i64) -> Result<Option<Patient>, DatabaseError> {
    let row = optional(conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
        params![id],
        patient_row,
    ))?;
    row.map(patient_from_row).transpose()
}

pub fn get_patient_by_session(
    conn: &Connection,
    session_id: &str,
) -> Result<Option<Patient>, DatabaseError> {
    let row = optional(conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE session_id = ?1"),
        params![session_id],
        patient_row,
    ))?;
    row.map(patient_from_row).transpose()
}

pub fn count_patients(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?)
}

/// Delete patients created before `cutoff`; their chat turns and
/// assessments go with them. Returns the number of patients removed.
pub fn delete_patients_before(
    conn: &Connection,
    cutoff: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM patients WHERE created_at < ?1", params![cutoff])?)
}

struct PatientRow {
    id: i64,
    session_id: String,
    first_name: String,
    last_name: String,
    age: u32,
    gender: String,
    postcode: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    existing_conditions: String,
    current_medications: String,
    allergies: String,
    emergency_contact: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn patient_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        age: row.get(4)?,
        gender: row.get(5)?,
        postcode: row.get(6)?,
        phone: row.get(7)?,
        email: row.get(8)?,
        existing_conditions: row.get(9)?,
        current_medications: row.get(10)?,
        allergies: row.get(11)?,
        emergency_contact: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: row.id,
        session_id: row.session_id,
        first_name: row.first_name,
        last_name: row.last_name,
        age: row.age,
        gender: Gender::from_str(&row.gender)?,
        postcode: row.postcode,
        phone: row.phone,
        email: row.email,
        existing_conditions: decode_list(&row.existing_conditions),
        current_medications: decode_list(&row.current_medications),
        allergies: decode_list(&row.allergies),
        emergency_contact: row.emergency_contact,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
