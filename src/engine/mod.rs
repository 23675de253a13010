//! The reconciliation engine: rule lookup, linkage resolution, guarded
//! writes, and change notification for one clinical event at a time.
//!
//! Every failure mode here is an outcome, not an error: a failed
//! reconciliation never blocks the action that triggered it. Marking a
//! treatment completed always succeeds even when the chart update could
//! not be resolved; the backfill runner picks it up later.

pub mod backfill;
pub mod reconciler;
pub mod resolver;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{
    get_appointment, get_treatment, insert_linkage_audit, set_appointment_status,
    set_treatment_status, LinkageAuditEntry,
};
use crate::db::DatabaseError;
use crate::models::enums::{AppointmentStatus, ChangeKind, ChangedEntity, TreatmentStatus};
use crate::models::ClinicalEvent;
use crate::publisher::{ChangeNotification, ChangePublisher};
use crate::rules;
use self::reconciler::{now_micros, WriteOutcome};
use self::resolver::Resolution;

/// Outcome of one clinical event. A single event can touch several
/// records (an appointment with multiple tooth links), so the applied
/// variant carries per-record results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied {
        updated: Vec<Uuid>,
        unchanged: Vec<Uuid>,
        conflicted: Vec<Uuid>,
    },
    /// Label matched nothing in the rule table; event ignored.
    NoRuleMatch,
    /// More than one plausible target; nothing written.
    Ambiguous { candidates: usize },
    /// No target diagnosis could be resolved.
    NoTarget,
}

/// Run one reconciliation unit of work: rule lookup, resolution, guarded
/// write per target, change notification per successful write.
pub fn handle_event(
    conn: &Connection,
    publisher: Option<&ChangePublisher>,
    event: &ClinicalEvent,
) -> Result<EventOutcome, DatabaseError> {
    let Some(rule) = rules::resolve_event(&event.label) else {
        tracing::info!(
            patient_id = %event.patient_id,
            label = %event.label,
            "No rule match for event label, ignoring"
        );
        return Ok(EventOutcome::NoRuleMatch);
    };

    let targets = match resolver::resolve(conn, event)? {
        Resolution::Targets(targets) => targets,
        Resolution::Ambiguous { candidates } => {
            tracing::warn!(
                patient_id = %event.patient_id,
                label = %event.label,
                candidates,
                "Ambiguous linkage, skipping event"
            );
            return Ok(EventOutcome::Ambiguous { candidates });
        }
        Resolution::NoTarget => {
            tracing::info!(
                patient_id = %event.patient_id,
                label = %event.label,
                "No target diagnosis for event"
            );
            return Ok(EventOutcome::NoTarget);
        }
    };

    let mut updated = Vec::new();
    let mut unchanged = Vec::new();
    let mut conflicted = Vec::new();

    for target in targets {
        insert_linkage_audit(
            conn,
            &LinkageAuditEntry {
                timestamp: now_micros(),
                patient_id: event.patient_id,
                event_kind: event.kind.as_str().to_string(),
                event_label: event.label.clone(),
                tooth_diagnosis_id: Some(target.tooth_diagnosis_id),
                method: target.method.as_str().to_string(),
                match_kind: Some(rule.match_kind.as_str().to_string()),
                inferred: target.inferred,
            },
        )?;
        if target.inferred {
            tracing::info!(
                tooth_diagnosis_id = %target.tooth_diagnosis_id,
                method = target.method.as_str(),
                "Inferred linkage recorded for review"
            );
        }

        match reconciler::apply_rule(conn, &target.tooth_diagnosis_id, &rule)? {
            WriteOutcome::Updated(next) => {
                if let Some(publisher) = publisher {
                    publisher.publish(ChangeNotification {
                        patient_id: event.patient_id,
                        entity: ChangedEntity::ToothDiagnosis,
                        entity_id: next.id,
                        change_kind: ChangeKind::Update,
                    });
                }
                updated.push(next.id);
            }
            WriteOutcome::Unchanged => unchanged.push(target.tooth_diagnosis_id),
            WriteOutcome::Conflict => conflicted.push(target.tooth_diagnosis_id),
            WriteOutcome::Missing => {
                tracing::warn!(
                    tooth_diagnosis_id = %target.tooth_diagnosis_id,
                    "Resolved diagnosis vanished before write, skipping"
                );
            }
        }
    }

    Ok(EventOutcome::Applied {
        updated,
        unchanged,
        conflicted,
    })
}

/// Mark a treatment completed and reconcile the affected tooth. The
/// status change always lands; the reconciliation result is returned as
/// an outcome for the caller to surface or ignore.
///
/// An already-completed treatment is replayed without a status write;
/// a cancelled one is never reopened.
pub fn complete_treatment(
    conn: &Connection,
    publisher: Option<&ChangePublisher>,
    treatment_id: &Uuid,
) -> Result<EventOutcome, DatabaseError> {
    let Some(current) = get_treatment(conn, treatment_id)? else {
        return Err(DatabaseError::NotFound {
            entity_type: "treatment".into(),
            id: treatment_id.to_string(),
        });
    };
    if current.status == TreatmentStatus::Completed {
        return handle_event(
            conn,
            publisher,
            &ClinicalEvent::from_completed_treatment(&current),
        );
    }
    if current.status.is_terminal() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "treatment {treatment_id} is {} and cannot be completed",
            current.status.as_str()
        )));
    }

    let Some(treatment) =
        set_treatment_status(conn, treatment_id, TreatmentStatus::Completed, now_micros())?
    else {
        return Err(DatabaseError::NotFound {
            entity_type: "treatment".into(),
            id: treatment_id.to_string(),
        });
    };

    if let Some(publisher) = publisher {
        publisher.publish(ChangeNotification {
            patient_id: treatment.patient_id,
            entity: ChangedEntity::Treatment,
            entity_id: treatment.id,
            change_kind: ChangeKind::Update,
        });
    }

    handle_event(
        conn,
        publisher,
        &ClinicalEvent::from_completed_treatment(&treatment),
    )
}

/// Mark an appointment completed and reconcile its linked teeth. Same
/// terminal-state handling as `complete_treatment`.
pub fn complete_appointment(
    conn: &Connection,
    publisher: Option<&ChangePublisher>,
    appointment_id: &Uuid,
) -> Result<EventOutcome, DatabaseError> {
    let Some(current) = get_appointment(conn, appointment_id)? else {
        return Err(DatabaseError::NotFound {
            entity_type: "appointment".into(),
            id: appointment_id.to_string(),
        });
    };
    if current.status == AppointmentStatus::Completed {
        return handle_event(
            conn,
            publisher,
            &ClinicalEvent::from_completed_appointment(&current),
        );
    }
    if current.status.is_terminal() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "appointment {appointment_id} is {} and cannot be completed",
            current.status.as_str()
        )));
    }

    let Some(appointment) = set_appointment_status(
        conn,
        appointment_id,
        AppointmentStatus::Completed,
        now_micros(),
    )?
    else {
        return Err(DatabaseError::NotFound {
            entity_type: "appointment".into(),
            id: appointment_id.to_string(),
        });
    };

    if let Some(publisher) = publisher {
        publisher.publish(ChangeNotification {
            patient_id: appointment.patient_id,
            entity: ChangedEntity::Appointment,
            entity_id: appointment.id,
            change_kind: ChangeKind::Update,
        });
    }

    handle_event(
        conn,
        publisher,
        &ClinicalEvent::from_completed_appointment(&appointment),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::db::open_memory_database;
    use crate::db::repository::{
        get_tooth_diagnosis, insert_patient, insert_tooth_diagnosis, insert_treatment,
        query_inferred_linkages,
    };
    use crate::models::enums::{EventKind, ToothStatus};
    use crate::models::{Patient, ToothDiagnosis, Treatment};

    fn seed_patient(conn: &Connection) -> Uuid {
        let patient = Patient {
            id: Uuid::new_v4(),
            name: "Test Patient".into(),
            created_at: Utc::now().naive_utc(),
        };
        insert_patient(conn, &patient).unwrap();
        patient.id
    }

    fn seed_diagnosis(
        conn: &Connection,
        patient_id: Uuid,
        tooth: &str,
        recommended: Option<&str>,
    ) -> ToothDiagnosis {
        let now = now_micros();
        let diag = ToothDiagnosis {
            id: Uuid::new_v4(),
            patient_id,
            tooth_number: tooth.into(),
            status: ToothStatus::Caries,
            primary_diagnosis: "caries".into(),
            recommended_treatment: recommended.map(Into::into),
            color_code: rules::color_for(ToothStatus::Caries).into(),
            follow_up_required: true,
            consultation_id: None,
            created_at: now,
            updated_at: now,
        };
        insert_tooth_diagnosis(conn, &diag).unwrap();
        diag
    }

    #[test]
    fn completed_root_canal_updates_tooth_11() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let diag = seed_diagnosis(&conn, patient, "11", None);

        let now = now_micros();
        let treatment = Treatment {
            id: Uuid::new_v4(),
            patient_id: patient,
            treatment_type: "Root canal treatment".into(),
            tooth_number: Some("11".into()),
            tooth_diagnosis_id: None,
            consultation_id: None,
            appointment_id: None,
            provider_id: None,
            status: TreatmentStatus::InProgress,
            created_at: now,
            updated_at: now,
        };
        insert_treatment(&conn, &treatment).unwrap();

        let outcome = complete_treatment(&conn, None, &treatment.id).unwrap();
        assert!(matches!(outcome, EventOutcome::Applied { ref updated, .. } if updated == &[diag.id]));

        let stored = get_tooth_diagnosis(&conn, &diag.id).unwrap().unwrap();
        assert_eq!(stored.status, ToothStatus::RootCanal);
        assert_eq!(stored.color_code, "#8b5cf6");
        assert!(!stored.follow_up_required);
    }

    #[test]
    fn unknown_label_is_no_rule_match_and_leaves_row_alone() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let diag = seed_diagnosis(&conn, patient, "16", None);

        let event = ClinicalEvent {
            patient_id: patient,
            kind: EventKind::TreatmentCompleted,
            label: "unspecified procedure".into(),
            tooth_number: Some("16".into()),
            tooth_diagnosis_id: None,
            consultation_id: None,
            appointment_id: None,
        };
        let outcome = handle_event(&conn, None, &event).unwrap();
        assert_eq!(outcome, EventOutcome::NoRuleMatch);

        let stored = get_tooth_diagnosis(&conn, &diag.id).unwrap().unwrap();
        assert_eq!(stored.status, ToothStatus::Caries);
        assert_eq!(stored.updated_at, diag.updated_at);
    }

    #[test]
    fn ambiguous_event_writes_nothing() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let a = seed_diagnosis(&conn, patient, "16", Some("filling"));
        let b = seed_diagnosis(&conn, patient, "26", Some("composite filling"));

        let event = ClinicalEvent {
            patient_id: patient,
            kind: EventKind::TreatmentCompleted,
            label: "filling".into(),
            tooth_number: None,
            tooth_diagnosis_id: None,
            consultation_id: None,
            appointment_id: None,
        };
        let outcome = handle_event(&conn, None, &event).unwrap();
        assert_eq!(outcome, EventOutcome::Ambiguous { candidates: 2 });

        for diag in [&a, &b] {
            let stored = get_tooth_diagnosis(&conn, &diag.id).unwrap().unwrap();
            assert_eq!(stored.status, ToothStatus::Caries);
        }
    }

    #[test]
    fn inferred_linkage_lands_in_audit_log() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_diagnosis(&conn, patient, "36", None);

        let event = ClinicalEvent {
            patient_id: patient,
            kind: EventKind::TreatmentCompleted,
            label: "filling".into(),
            tooth_number: Some("36".into()),
            tooth_diagnosis_id: None,
            consultation_id: None,
            appointment_id: None,
        };
        handle_event(&conn, None, &event).unwrap();

        let inferred = query_inferred_linkages(&conn, &patient).unwrap();
        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].3, "patient_tooth");
    }

    #[test]
    fn completion_publishes_treatment_and_diagnosis_changes() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let diag = seed_diagnosis(&conn, patient, "11", None);

        let now = now_micros();
        let treatment = Treatment {
            id: Uuid::new_v4(),
            patient_id: patient,
            treatment_type: "crown placement".into(),
            tooth_number: Some("11".into()),
            tooth_diagnosis_id: Some(diag.id),
            consultation_id: None,
            appointment_id: None,
            provider_id: None,
            status: TreatmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        insert_treatment(&conn, &treatment).unwrap();

        let publisher = ChangePublisher::new();
        let mut rx = publisher.subscribe(patient);
        complete_treatment(&conn, Some(&publisher), &treatment.id).unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.entity, ChangedEntity::Treatment);
        assert_eq!(first.entity_id, treatment.id);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.entity, ChangedEntity::ToothDiagnosis);
        assert_eq!(second.entity_id, diag.id);
    }

    #[test]
    fn completing_unknown_treatment_is_a_hard_error() {
        let conn = open_memory_database().unwrap();
        seed_patient(&conn);
        let err = complete_treatment(&conn, None, &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn cancelled_treatment_is_never_reopened() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_diagnosis(&conn, patient, "11", None);

        let now = now_micros();
        let treatment = Treatment {
            id: Uuid::new_v4(),
            patient_id: patient,
            treatment_type: "filling".into(),
            tooth_number: Some("11".into()),
            tooth_diagnosis_id: None,
            consultation_id: None,
            appointment_id: None,
            provider_id: None,
            status: TreatmentStatus::Cancelled,
            created_at: now,
            updated_at: now,
        };
        insert_treatment(&conn, &treatment).unwrap();

        let err = complete_treatment(&conn, None, &treatment.id).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        let stored = get_treatment(&conn, &treatment.id).unwrap().unwrap();
        assert_eq!(stored.status, TreatmentStatus::Cancelled);
    }

    #[test]
    fn completing_twice_replays_without_status_write() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let diag = seed_diagnosis(&conn, patient, "11", None);

        let now = now_micros();
        let treatment = Treatment {
            id: Uuid::new_v4(),
            patient_id: patient,
            treatment_type: "crown placement".into(),
            tooth_number: Some("11".into()),
            tooth_diagnosis_id: Some(diag.id),
            consultation_id: None,
            appointment_id: None,
            provider_id: None,
            status: TreatmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        insert_treatment(&conn, &treatment).unwrap();

        complete_treatment(&conn, None, &treatment.id).unwrap();
        let after_first = get_treatment(&conn, &treatment.id).unwrap().unwrap();

        let outcome = complete_treatment(&conn, None, &treatment.id).unwrap();
        assert!(
            matches!(outcome, EventOutcome::Applied { ref unchanged, .. } if unchanged == &[diag.id])
        );
        let after_second = get_treatment(&conn, &treatment.id).unwrap().unwrap();
        assert_eq!(after_first.updated_at, after_second.updated_at);
    }
}
