//! Idempotent repair passes over historical data.
//!
//! Event replay walks every completed treatment and appointment through
//! the same resolver + reconciler as live traffic; color integrity
//! re-derives `color_code` from `status` for every diagnosis row. Both
//! are safe to re-run at any time, including concurrently with live
//! traffic: every write goes through the optimistic guard, and a
//! timed-out run is resumed by simply running the pass again.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::repository::{
    list_all_tooth_diagnoses, list_completed_appointments, list_completed_treatments,
    set_color_code,
};
use crate::db::DatabaseError;
use crate::models::enums::{ChangeKind, ChangedEntity};
use crate::models::ClinicalEvent;
use crate::publisher::{ChangeNotification, ChangePublisher};
use crate::rules;

use super::{handle_event, EventOutcome};

/// Per-pass counts reported to the administrative caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub updated: u32,
    /// No rule match, no resolvable target, or already consistent.
    pub skipped: u32,
    pub ambiguous: u32,
    pub conflicted: u32,
}

impl PassSummary {
    fn absorb(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Applied {
                updated,
                unchanged,
                conflicted,
            } => {
                self.updated += updated.len() as u32;
                self.skipped += unchanged.len() as u32;
                self.conflicted += conflicted.len() as u32;
            }
            EventOutcome::NoRuleMatch | EventOutcome::NoTarget => self.skipped += 1,
            EventOutcome::Ambiguous { .. } => self.ambiguous += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BackfillReport {
    pub replay: PassSummary,
    pub color: PassSummary,
}

/// Replay every completed treatment and appointment through the
/// reconciler. Order does not matter: each reconcile is independent per
/// target record, and re-running recomputes the same rule output.
pub fn run_event_replay(
    conn: &Connection,
    publisher: Option<&ChangePublisher>,
) -> Result<PassSummary, DatabaseError> {
    let mut summary = PassSummary::default();

    for treatment in list_completed_treatments(conn)? {
        let event = ClinicalEvent::from_completed_treatment(&treatment);
        let outcome = handle_event(conn, publisher, &event)?;
        summary.absorb(&outcome);
    }

    for appointment in list_completed_appointments(conn)? {
        let event = ClinicalEvent::from_completed_appointment(&appointment);
        let outcome = handle_event(conn, publisher, &event)?;
        summary.absorb(&outcome);
    }

    tracing::info!(
        updated = summary.updated,
        skipped = summary.skipped,
        ambiguous = summary.ambiguous,
        conflicted = summary.conflicted,
        "Event replay pass finished"
    );
    Ok(summary)
}

/// Repair every diagnosis row whose stored color disagrees with the rule
/// table's color for its status. Self-healing against manual or
/// erroneous direct writes.
pub fn run_color_integrity(
    conn: &Connection,
    publisher: Option<&ChangePublisher>,
) -> Result<PassSummary, DatabaseError> {
    let mut summary = PassSummary::default();

    for diag in list_all_tooth_diagnoses(conn)? {
        let expected = rules::color_for(diag.status);
        if diag.color_code == expected {
            summary.skipped += 1;
            continue;
        }

        if set_color_code(conn, &diag.id, expected, diag.status)? == 1 {
            tracing::info!(
                tooth_diagnosis_id = %diag.id,
                status = diag.status.as_str(),
                stored = %diag.color_code,
                expected,
                "Repaired color drift"
            );
            if let Some(publisher) = publisher {
                publisher.publish(ChangeNotification {
                    patient_id: diag.patient_id,
                    entity: ChangedEntity::ToothDiagnosis,
                    entity_id: diag.id,
                    change_kind: ChangeKind::Update,
                });
            }
            summary.updated += 1;
        } else {
            summary.conflicted += 1;
        }
    }

    tracing::info!(updated = summary.updated, "Color integrity pass finished");
    Ok(summary)
}

/// Both passes, replay first so the color pass verifies the final state.
pub fn run_backfill(
    conn: &Connection,
    publisher: Option<&ChangePublisher>,
) -> Result<BackfillReport, DatabaseError> {
    Ok(BackfillReport {
        replay: run_event_replay(conn, publisher)?,
        color: run_color_integrity(conn, publisher)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use uuid::Uuid;

    use crate::db::open_memory_database;
    use crate::db::repository::{
        fmt_ts, get_tooth_diagnosis, insert_appointment, insert_patient, insert_tooth_diagnosis,
        insert_tooth_link, insert_treatment, list_all_tooth_diagnoses,
    };
    use crate::engine::reconciler::now_micros;
    use crate::models::enums::{AppointmentStatus, ToothStatus, TreatmentStatus};
    use crate::models::{Appointment, AppointmentToothLink, Patient, ToothDiagnosis, Treatment};

    fn seed_patient(conn: &Connection) -> Uuid {
        let patient = Patient {
            id: Uuid::new_v4(),
            name: "Test Patient".into(),
            created_at: now_micros(),
        };
        insert_patient(conn, &patient).unwrap();
        patient.id
    }

    fn seed_diagnosis(conn: &Connection, patient_id: Uuid, tooth: &str) -> ToothDiagnosis {
        let now = now_micros();
        let diag = ToothDiagnosis {
            id: Uuid::new_v4(),
            patient_id,
            tooth_number: tooth.into(),
            status: ToothStatus::Caries,
            primary_diagnosis: "caries".into(),
            recommended_treatment: None,
            color_code: rules::color_for(ToothStatus::Caries).into(),
            follow_up_required: true,
            consultation_id: None,
            created_at: now,
            updated_at: now,
        };
        insert_tooth_diagnosis(conn, &diag).unwrap();
        diag
    }

    fn seed_completed_treatment(
        conn: &Connection,
        patient_id: Uuid,
        treatment_type: &str,
        tooth: Option<&str>,
    ) -> Treatment {
        let now = now_micros();
        let treatment = Treatment {
            id: Uuid::new_v4(),
            patient_id,
            treatment_type: treatment_type.into(),
            tooth_number: tooth.map(Into::into),
            tooth_diagnosis_id: None,
            consultation_id: None,
            appointment_id: None,
            provider_id: None,
            status: TreatmentStatus::Completed,
            created_at: now,
            updated_at: now,
        };
        insert_treatment(conn, &treatment).unwrap();
        treatment
    }

    #[test]
    fn replay_applies_completed_treatment_to_tooth() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let diag = seed_diagnosis(&conn, patient, "11");
        seed_completed_treatment(&conn, patient, "Root canal treatment", Some("11"));

        let summary = run_event_replay(&conn, None).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.conflicted, 0);

        let stored = get_tooth_diagnosis(&conn, &diag.id).unwrap().unwrap();
        assert_eq!(stored.status, ToothStatus::RootCanal);
        assert_eq!(stored.color_code, "#8b5cf6");
    }

    #[test]
    fn replay_applies_completed_appointment_via_tooth_link() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let diag = seed_diagnosis(&conn, patient, "24");

        let now = now_micros();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient,
            appointment_type: "Teeth Cleaning".into(),
            status: AppointmentStatus::Completed,
            provider_id: None,
            scheduled_at: now,
            updated_at: now,
        };
        insert_appointment(&conn, &appointment).unwrap();
        insert_tooth_link(
            &conn,
            &AppointmentToothLink {
                appointment_id: appointment.id,
                tooth_number: "24".into(),
                tooth_diagnosis_id: None,
            },
        )
        .unwrap();

        let summary = run_event_replay(&conn, None).unwrap();
        assert_eq!(summary.updated, 1);

        let stored = get_tooth_diagnosis(&conn, &diag.id).unwrap().unwrap();
        assert_eq!(stored.status, ToothStatus::Healthy);
        assert_eq!(stored.color_code, "#22c55e");
    }

    #[test]
    fn replay_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_diagnosis(&conn, patient, "11");
        seed_diagnosis(&conn, patient, "26");
        seed_completed_treatment(&conn, patient, "Root canal treatment", Some("11"));
        seed_completed_treatment(&conn, patient, "composite filling", Some("26"));

        let first = run_event_replay(&conn, None).unwrap();
        assert_eq!(first.updated, 2);
        let rows_after_first: Vec<String> = list_all_tooth_diagnoses(&conn)
            .unwrap()
            .iter()
            .map(|d| format!("{}|{}|{}|{}", d.id, d.status.as_str(), d.color_code, fmt_ts(d.updated_at)))
            .collect();

        let second = run_event_replay(&conn, None).unwrap();
        assert_eq!(second.updated, 0);
        let rows_after_second: Vec<String> = list_all_tooth_diagnoses(&conn)
            .unwrap()
            .iter()
            .map(|d| format!("{}|{}|{}|{}", d.id, d.status.as_str(), d.color_code, fmt_ts(d.updated_at)))
            .collect();

        assert_eq!(rows_after_first, rows_after_second);
    }

    #[test]
    fn replay_counts_no_rule_match_as_skipped() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let diag = seed_diagnosis(&conn, patient, "16");
        seed_completed_treatment(&conn, patient, "unspecified procedure", Some("16"));

        let summary = run_event_replay(&conn, None).unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.skipped, 1);

        let stored = get_tooth_diagnosis(&conn, &diag.id).unwrap().unwrap();
        assert_eq!(stored.status, ToothStatus::Caries);
    }

    #[test]
    fn replay_counts_ambiguous_without_writing() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        for (tooth, rec) in [("16", "filling"), ("26", "composite filling")] {
            let diag = seed_diagnosis(&conn, patient, tooth);
            conn.execute(
                "UPDATE tooth_diagnoses SET recommended_treatment = ?1 WHERE id = ?2",
                params![rec, diag.id.to_string()],
            )
            .unwrap();
        }
        seed_completed_treatment(&conn, patient, "filling", None);

        let summary = run_event_replay(&conn, None).unwrap();
        assert_eq!(summary.ambiguous, 1);
        assert_eq!(summary.updated, 0);
        for diag in list_all_tooth_diagnoses(&conn).unwrap() {
            assert_eq!(diag.status, ToothStatus::Caries);
        }
    }

    #[test]
    fn color_pass_repairs_stale_color() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let diag = seed_diagnosis(&conn, patient, "31");
        // Simulate an erroneous direct write: caries wearing healthy green.
        conn.execute(
            "UPDATE tooth_diagnoses SET color_code = '#22c55e' WHERE id = ?1",
            params![diag.id.to_string()],
        )
        .unwrap();

        let summary = run_color_integrity(&conn, None).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.skipped, 0);

        let stored = get_tooth_diagnosis(&conn, &diag.id).unwrap().unwrap();
        assert_eq!(stored.status, ToothStatus::Caries);
        assert_eq!(stored.color_code, "#ef4444");

        // Second run finds nothing to repair; every row reads as skipped.
        let again = run_color_integrity(&conn, None).unwrap();
        assert_eq!(again.updated, 0);
        assert_eq!(again.skipped, 1);
    }

    #[test]
    fn color_repair_from_stale_snapshot_lands_on_zero_rows() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        let diag = seed_diagnosis(&conn, patient, "11");
        conn.execute(
            "UPDATE tooth_diagnoses SET color_code = '#000000' WHERE id = ?1",
            params![diag.id.to_string()],
        )
        .unwrap();

        // A live reconcile moves the status after the pass read its snapshot.
        seed_completed_treatment(&conn, patient, "Root canal treatment", Some("11"));
        run_event_replay(&conn, None).unwrap();

        // The repair derived from the stale caries status must not land.
        let affected =
            set_color_code(&conn, &diag.id, "#ef4444", ToothStatus::Caries).unwrap();
        assert_eq!(affected, 0);

        let stored = get_tooth_diagnosis(&conn, &diag.id).unwrap().unwrap();
        assert_eq!(stored.status, ToothStatus::RootCanal);
        assert_eq!(stored.color_code, rules::color_for(ToothStatus::RootCanal));
    }

    #[test]
    fn color_invariant_holds_after_backfill() {
        let conn = open_memory_database().unwrap();
        let patient = seed_patient(&conn);
        seed_diagnosis(&conn, patient, "11");
        seed_diagnosis(&conn, patient, "24");
        seed_completed_treatment(&conn, patient, "Root canal treatment", Some("11"));
        conn.execute(
            "UPDATE tooth_diagnoses SET color_code = '#000000' WHERE tooth_number = '24'",
            [],
        )
        .unwrap();

        let report = run_backfill(&conn, None).unwrap();
        assert!(report.replay.updated >= 1);

        for diag in list_all_tooth_diagnoses(&conn).unwrap() {
            assert_eq!(diag.color_code, rules::color_for(diag.status));
        }
    }
}
