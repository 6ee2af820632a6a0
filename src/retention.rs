//! Periodic deletion of expired chat turns and patients.
//!
//! Chat turns older than the chat retention period and patients older than
//! the patient retention period are removed. Deleting a patient cascades to
//! its chat turns and assessments.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rusqlite::Connection;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::RetentionConfig;
use crate::db::{self, Database, DatabaseError, SystemEvent};
use crate::models::EventLevel;

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub chat_messages: usize,
    pub patients: usize,
}

impl RetentionReport {
    pub fn is_empty(&self) -> bool {
        self.chat_messages == 0 && self.patients == 0
    }
}

/// Run one sweep against `now`, in a single transaction.
pub fn sweep(
    conn: &mut Connection,
    config: &RetentionConfig,
    now: DateTime<Utc>,
) -> Result<RetentionReport, DatabaseError> {
    let chat_cutoff = now - ChronoDuration::days(config.chat_retention_days);
    let patient_cutoff = now - ChronoDuration::days(config.patient_retention_days);

    let tx = conn.transaction()?;
    let chat_messages = db::delete_chat_messages_before(&tx, chat_cutoff)?;
    let patients = db::delete_patients_before(&tx, patient_cutoff)?;

    let report = RetentionReport {
        chat_messages,
        patients,
    };
    if !report.is_empty() {
        db::insert_system_event(
            &tx,
            &SystemEvent::new(
                EventLevel::Info,
                "retention",
                format!(
                    "Retention sweep removed {chat_messages} chat messages and {patients} patients"
                ),
            ),
        )?;
    }
    tx.commit()?;

    Ok(report)
}

/// Handle for the background retention task.
pub struct RetentionHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RetentionHandle {
    /// Stop the task after any sweep in progress completes.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

/// Spawn the periodic sweep. The first sweep runs immediately.
pub fn start_retention_task(db: Database, config: RetentionConfig) -> RetentionHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        tracing::info!(
            interval_secs = config.sweep_interval.as_secs(),
            chat_days = config.chat_retention_days,
            patient_days = config.patient_retention_days,
            "Retention sweep started"
        );
        let mut ticker = tokio::time::interval(config.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => run_once(&db, &config).await,
            }
        }
        tracing::info!("Retention sweep shutting down");
    });

    RetentionHandle {
        shutdown_tx: Some(shutdown_tx),
        task,
    }
}

async fn run_once(db: &Database, config: &RetentionConfig) {
    let config = config.clone();
    match db.call(move |conn| sweep(conn, &config, Utc::now())).await {
        Ok(report) if report.is_empty() => tracing::debug!("Retention sweep: nothing expired"),
        Ok(report) => tracing::info!(
            chat_messages = report.chat_messages,
            patients = report.patients,
            "Retention sweep completed"
        ),
        Err(e) => tracing::warn!(error = %e, "Retention sweep failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::db::sqlite::open_memory_database;
    use crate::models::{MessageRole, NewAssessment, NewChatMessage, NewPatient, SymptomCategory};

    fn config() -> RetentionConfig {
        RetentionConfig {
            chat_retention_days: 7,
            patient_retention_days: 30,
            sweep_interval: Duration::from_secs(3600),
        }
    }

    fn chat(conn: &Connection, session: &str, patient_id: i64, at: DateTime<Utc>) -> i64 {
        db::insert_chat_message(
            conn,
            &NewChatMessage {
                session_id: session.into(),
                patient_id: Some(patient_id),
                message: "hello".into(),
                role: MessageRole::User,
            },
            at,
        )
        .unwrap()
        .id
    }

    #[test]
    fn sweep_respects_cutoffs() {
        let mut conn = open_memory_database().unwrap();
        let now = Utc::now();

        let recent = db::upsert_patient(&conn, "recent", &NewPatient::anonymous(), now).unwrap();
        let old = db::upsert_patient(
            &conn,
            "old",
            &NewPatient::anonymous(),
            now - ChronoDuration::days(31),
        )
        .unwrap();

        let stale_chat = chat(&conn, "recent", recent.id, now - ChronoDuration::days(8));
        let fresh_chat = chat(&conn, "recent", recent.id, now - ChronoDuration::days(6));
        chat(&conn, "old", old.id, now - ChronoDuration::days(1));

        db::insert_assessment(
            &conn,
            &NewAssessment {
                session_id: "old".into(),
                patient_id: old.id,
                symptom_category: SymptomCategory::Pain,
                primary_symptom: "knee".into(),
                severity: 3,
                duration: "1 month".into(),
                additional_symptoms: vec![],
            },
            now - ChronoDuration::days(31),
        )
        .unwrap();

        let report = sweep(&mut conn, &config(), now).unwrap();
        assert_eq!(report.chat_messages, 1);
        assert_eq!(report.patients, 1);

        assert!(db::get_chat_message(&conn, stale_chat).unwrap().is_none());
        assert!(db::get_chat_message(&conn, fresh_chat).unwrap().is_some());
        assert!(db::get_patient(&conn, old.id).unwrap().is_none());
        assert!(db::get_patient(&conn, recent.id).unwrap().is_some());
        // Cascaded with the old patient.
        assert_eq!(db::count_chat_messages(&conn).unwrap(), 1);
        assert_eq!(db::count_assessments(&conn).unwrap(), 0);
        assert_eq!(db::count_system_events(&conn, EventLevel::Info).unwrap(), 1);
    }

    #[test]
    fn empty_sweep_records_nothing() {
        let mut conn = open_memory_database().unwrap();
        let report = sweep(&mut conn, &config(), Utc::now()).unwrap();
        assert!(report.is_empty());
        assert_eq!(db::count_system_events(&conn, EventLevel::Info).unwrap(), 0);
    }

    #[tokio::test]
    async fn background_task_sweeps_and_stops() {
        let store = Database::open_in_memory().unwrap();
        let old = Utc::now() - ChronoDuration::days(60);
        store.with_conn(|conn| {
            db::upsert_patient(conn, "expired", &NewPatient::anonymous(), old).map(|_| ())
        })
        .unwrap();

        let handle = start_retention_task(store.clone(), config());
        let mut remaining = 1;
        for _ in 0..50 {
            remaining = store.with_conn(|conn| db::count_patients(conn)).unwrap();
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(remaining, 0);
        handle.shutdown().await;
    }
}
