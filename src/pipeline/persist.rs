//! Writing finished responses back to the record that requested them.

use std::time::Duration;

use chrono::Utc;

use super::urgency::{classify_urgency, derive_recommendations};
use crate::db::{self, Database, DatabaseError, SystemEvent};
use crate::models::{AssessmentResponse, RecordKind, UrgencyLabel};

/// The stored record a response belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PersistTarget {
    /// A user chat turn; the response becomes its assistant reply.
    ChatTurn { message_id: i64 },
    /// A triage assessment.
    Assessment {
        assessment_id: i64,
        confidence: Option<f64>,
    },
}

impl PersistTarget {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::ChatTurn { .. } => RecordKind::ChatTurn,
            Self::Assessment { .. } => RecordKind::Assessment,
        }
    }

    pub fn record_id(&self) -> i64 {
        match self {
            Self::ChatTurn { message_id } => *message_id,
            Self::Assessment { assessment_id, .. } => *assessment_id,
        }
    }
}

/// A complete response, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedResponse {
    pub text: String,
    /// Time from request start to completion, when known.
    pub elapsed: Option<Duration>,
    /// Number of text chunks received.
    pub chunks: usize,
}

/// What a successful write produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    ChatReply { reply_id: i64 },
    Assessment { urgency: UrgencyLabel },
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("No {kind} record with id {id}")]
    NotFound { kind: RecordKind, id: i64 },
}

/// Stores finished responses and operational events.
pub trait ResponsePersister: Send + Sync {
    /// Store `response` against `target` in a single transaction.
    fn persist(
        &self,
        target: &PersistTarget,
        response: &CompletedResponse,
    ) -> Result<PersistOutcome, PersistError>;

    /// Best-effort write of an operational event.
    fn record_event(&self, event: &SystemEvent);
}

/// [`ResponsePersister`] over the SQLite store.
#[derive(Clone)]
pub struct SqlitePersister {
    db: Database,
    model: String,
}

impl SqlitePersister {
    pub fn new(db: Database, model: impl Into<String>) -> Self {
        Self {
            db,
            model: model.into(),
        }
    }
}

impl ResponsePersister for SqlitePersister {
    fn persist(
        &self,
        target: &PersistTarget,
        response: &CompletedResponse,
    ) -> Result<PersistOutcome, PersistError> {
        let now = Utc::now();
        let not_found = || PersistError::NotFound {
            kind: target.kind(),
            id: target.record_id(),
        };

        self.db.with_conn(|conn| {
            // Rolled back on drop unless committed.
            let tx = conn.transaction().map_err(DatabaseError::from)?;

            let outcome = match *target {
                PersistTarget::ChatTurn { message_id } => {
                    let turn = db::get_chat_message(&tx, message_id)?.ok_or_else(not_found)?;
                    let reply_id = db::upsert_assistant_reply(
                        &tx,
                        &turn,
                        &response.text,
                        response.chunks as i64,
                        response.elapsed.map(|d| d.as_secs_f64()).unwrap_or(0.0),
                        now,
                    )?;
                    PersistOutcome::ChatReply { reply_id }
                }
                PersistTarget::Assessment {
                    assessment_id,
                    confidence,
                } => {
                    let urgency = classify_urgency(&response.text);
                    let update = AssessmentResponse {
                        ai_response: response.text.clone(),
                        urgency_level: urgency,
                        recommendations: derive_recommendations(&response.text),
                        ai_model_used: self.model.clone(),
                        assessment_duration: response.elapsed.map(|d| d.as_secs() as i64),
                        confidence_score: confidence,
                    };
                    match db::update_assessment_response(&tx, assessment_id, &update, now) {
                        Err(DatabaseError::NotFound { .. }) => return Err(not_found()),
                        other => other?,
                    }
                    PersistOutcome::Assessment { urgency }
                }
            };

            tx.commit().map_err(DatabaseError::from)?;
            Ok(outcome)
        })
    }

    fn record_event(&self, event: &SystemEvent) {
        if let Err(e) = self.db.with_conn(|conn| db::insert_system_event(conn, event)) {
            tracing::warn!(error = %e, "Failed to store system event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use crate::pipeline::urgency::RECOMMENDATION_CHARS;

    fn setup() -> (Database, SqlitePersister) {
        let db = Database::open_in_memory().unwrap();
        let persister = SqlitePersister::new(db.clone(), "llama3.2:3b");
        (db, persister)
    }

    fn user_turn(db: &Database) -> ChatMessage {
        db.with_conn(|conn| {
            let patient = db::ensure_patient(conn, "s", Utc::now())?;
            db::insert_chat_message(
                conn,
                &NewChatMessage {
                    session_id: "s".into(),
                    patient_id: Some(patient.id),
                    message: "sore throat".into(),
                    role: MessageRole::User,
                },
                Utc::now(),
            )
        })
        .unwrap()
    }

    fn assessment(db: &Database) -> Assessment {
        db.with_conn(|conn| {
            let patient = db::ensure_patient(conn, "s", Utc::now())?;
            db::insert_assessment(
                conn,
                &NewAssessment {
                    session_id: "s".into(),
                    patient_id: patient.id,
                    symptom_category: SymptomCategory::Pain,
                    primary_symptom: "back pain".into(),
                    severity: 5,
                    duration: "1 week".into(),
                    additional_symptoms: vec![],
                },
                Utc::now(),
            )
        })
        .unwrap()
    }

    fn completed(text: &str) -> CompletedResponse {
        CompletedResponse {
            text: text.into(),
            elapsed: Some(Duration::from_millis(2500)),
            chunks: 3,
        }
    }

    #[test]
    fn chat_reply_is_stored_against_turn() {
        let (db, persister) = setup();
        let turn = user_turn(&db);

        let outcome = persister
            .persist(&PersistTarget::ChatTurn { message_id: turn.id }, &completed("Gargle salt water."))
            .unwrap();
        let PersistOutcome::ChatReply { reply_id } = outcome else {
            panic!("expected chat reply outcome");
        };

        let reply = db.with_conn(|conn| db::get_reply_to(conn, turn.id)).unwrap().unwrap();
        assert_eq!(reply.id, reply_id);
        assert_eq!(reply.message, "Gargle salt water.");
        assert_eq!(reply.patient_id, turn.patient_id);
        assert_eq!(reply.tokens_used, 3);
        assert!((reply.response_time - 2.5).abs() < 1e-9);
    }

    #[test]
    fn repeated_chat_persist_is_idempotent() {
        let (db, persister) = setup();
        let turn = user_turn(&db);
        let target = PersistTarget::ChatTurn { message_id: turn.id };

        let a = persister.persist(&target, &completed("same")).unwrap();
        let b = persister.persist(&target, &completed("same")).unwrap();
        assert_eq!(a, b);
        assert_eq!(db.with_conn(|conn| db::count_chat_messages(conn)).unwrap(), 2);
    }

    #[test]
    fn assessment_gets_urgency_and_recommendations() {
        let (db, persister) = setup();
        let a = assessment(&db);
        // Tier keyword only appears past the recommendation cut.
        let text = format!("{}Call 111 for advice.", "Rest and monitor. ".repeat(40));
        assert!(text.find("111").unwrap() > RECOMMENDATION_CHARS);

        let outcome = persister
            .persist(
                &PersistTarget::Assessment { assessment_id: a.id, confidence: Some(0.7) },
                &completed(&text),
            )
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Assessment { urgency: UrgencyLabel::Urgent });

        let stored = db.with_conn(|conn| db::get_assessment(conn, a.id)).unwrap().unwrap();
        assert_eq!(stored.ai_response.as_deref(), Some(text.as_str()));
        assert_eq!(stored.urgency_level, Some(UrgencyLabel::Urgent));

        let recommendations = stored.recommendations.unwrap();
        let expected: String = text.chars().take(RECOMMENDATION_CHARS).collect();
        assert_eq!(recommendations, expected);
        assert!(!recommendations.contains("111"));
        assert_eq!(classify_urgency(&recommendations), UrgencyLabel::SelfCare);

        assert_eq!(stored.ai_model_used.as_deref(), Some("llama3.2:3b"));
        assert_eq!(stored.assessment_duration, 2);
        assert!((stored.confidence_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn repeated_assessment_persist_is_idempotent() {
        let (db, persister) = setup();
        let a = assessment(&db);
        let text = format!("{}Call 999", "Keep warm. ".repeat(72));
        assert_eq!(text.chars().count(), 800);
        let target = PersistTarget::Assessment { assessment_id: a.id, confidence: Some(0.5) };

        let first_outcome = persister.persist(&target, &completed(&text)).unwrap();
        let first = db.with_conn(|conn| db::get_assessment(conn, a.id)).unwrap().unwrap();
        let second_outcome = persister.persist(&target, &completed(&text)).unwrap();
        let second = db.with_conn(|conn| db::get_assessment(conn, a.id)).unwrap().unwrap();

        assert_eq!(first_outcome, second_outcome);
        assert_eq!(first.urgency_level, Some(UrgencyLabel::Emergency));
        assert_eq!(first.ai_response, second.ai_response);
        assert_eq!(first.urgency_level, second.urgency_level);
        assert_eq!(first.recommendations, second.recommendations);
        assert_eq!(first.ai_model_used, second.ai_model_used);
        assert_eq!(first.assessment_duration, second.assessment_duration);
        assert_eq!(first.confidence_score, second.confidence_score);
        assert_eq!(second.recommendations.unwrap().chars().count(), RECOMMENDATION_CHARS);
        assert_eq!(db.with_conn(|conn| db::count_assessments(conn)).unwrap(), 1);
    }

    #[test]
    fn missing_records_are_not_found() {
        let (_db, persister) = setup();
        let err = persister
            .persist(&PersistTarget::ChatTurn { message_id: 7 }, &completed("x"))
            .unwrap_err();
        assert!(matches!(err, PersistError::NotFound { kind: RecordKind::ChatTurn, id: 7 }));

        let err = persister
            .persist(
                &PersistTarget::Assessment { assessment_id: 9, confidence: None },
                &completed("x"),
            )
            .unwrap_err();
        assert!(matches!(err, PersistError::NotFound { kind: RecordKind::Assessment, id: 9 }));
    }

    #[test]
    fn events_are_recorded() {
        let (db, persister) = setup();
        persister.record_event(&SystemEvent::new(EventLevel::Error, "relay", "Request timeout"));
        let n = db
            .with_conn(|conn| db::count_system_events(conn, EventLevel::Error))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn target_kind_and_id() {
        let t = PersistTarget::Assessment { assessment_id: 4, confidence: None };
        assert_eq!(t.kind(), RecordKind::Assessment);
        assert_eq!(t.record_id(), 4);
        assert_eq!(PersistTarget::ChatTurn { message_id: 2 }.kind().as_str(), "chat");
    }
}
