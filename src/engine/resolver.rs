//! Linkage resolution: which tooth-diagnosis record does a clinical
//! event affect?
//!
//! Fallback chain, stopping at the first non-empty result:
//! 1. direct `tooth_diagnosis_id` on the event
//! 2. (consultation_id, tooth_number) lookup
//! 3. most recently updated diagnosis for (patient_id, tooth_number),
//!    flagged inferred
//! 4. appointment tooth links, each re-entering steps 1–3
//!
//! With no tooth number and no id at all, the event label is compared
//! against each candidate's recommended-treatment text. Exactly one
//! plausible candidate is an allowed inference; more than one is
//! reported ambiguous so an unrelated tooth's history is never
//! corrupted by a guess.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::{
    latest_for_patient_tooth, links_for_appointment, list_tooth_diagnoses_for_patient,
    find_by_consultation_and_tooth, get_tooth_diagnosis,
};
use crate::db::DatabaseError;
use crate::models::ClinicalEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    DirectId,
    ConsultationTooth,
    PatientTooth,
    AppointmentLink,
    TreatmentText,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectId => "direct_id",
            Self::ConsultationTooth => "consultation_tooth",
            Self::PatientTooth => "patient_tooth",
            Self::AppointmentLink => "appointment_link",
            Self::TreatmentText => "treatment_text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub tooth_diagnosis_id: Uuid,
    pub method: ResolutionMethod,
    /// True when the match came from a fallback heuristic rather than an
    /// explicit foreign key. Always recorded in the linkage audit.
    pub inferred: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Targets(Vec<ResolvedTarget>),
    /// More than one plausible candidate and nothing to disambiguate.
    Ambiguous { candidates: usize },
    NoTarget,
}

pub fn resolve(conn: &Connection, event: &ClinicalEvent) -> Result<Resolution, DatabaseError> {
    // Steps 1–3 on the event itself.
    if let Some(target) = resolve_explicit(conn, event)? {
        return Ok(Resolution::Targets(vec![target]));
    }

    // Step 4: appointment tooth links re-enter steps 1–3.
    if let Some(appointment_id) = event.appointment_id {
        let links = links_for_appointment(conn, &appointment_id)?;
        let mut targets: Vec<ResolvedTarget> = Vec::new();
        for link in &links {
            let narrowed = event.narrowed_to_link(link);
            if let Some(inner) = resolve_explicit(conn, &narrowed)? {
                let target = ResolvedTarget {
                    tooth_diagnosis_id: inner.tooth_diagnosis_id,
                    method: ResolutionMethod::AppointmentLink,
                    inferred: inner.inferred,
                };
                if !targets
                    .iter()
                    .any(|t| t.tooth_diagnosis_id == target.tooth_diagnosis_id)
                {
                    targets.push(target);
                }
            }
        }
        if !targets.is_empty() {
            return Ok(Resolution::Targets(targets));
        }
    }

    // Text fallback only applies when the event carries no tooth number;
    // a tooth number that matched nothing means the tooth has no
    // diagnosis to update, not license to guess another tooth.
    if event.tooth_number.is_none() {
        return resolve_by_treatment_text(conn, event);
    }

    Ok(Resolution::NoTarget)
}

/// Steps 1–3: direct id, consultation + tooth, patient + tooth.
fn resolve_explicit(
    conn: &Connection,
    event: &ClinicalEvent,
) -> Result<Option<ResolvedTarget>, DatabaseError> {
    if let Some(id) = event.tooth_diagnosis_id {
        if get_tooth_diagnosis(conn, &id)?.is_some() {
            return Ok(Some(ResolvedTarget {
                tooth_diagnosis_id: id,
                method: ResolutionMethod::DirectId,
                inferred: false,
            }));
        }
        tracing::warn!(tooth_diagnosis_id = %id, "Event references missing diagnosis, falling through");
    }

    if let (Some(consultation_id), Some(tooth_number)) =
        (event.consultation_id, event.tooth_number.as_deref())
    {
        if let Some(diag) = find_by_consultation_and_tooth(conn, &consultation_id, tooth_number)? {
            return Ok(Some(ResolvedTarget {
                tooth_diagnosis_id: diag.id,
                method: ResolutionMethod::ConsultationTooth,
                inferred: false,
            }));
        }
    }

    if let Some(tooth_number) = event.tooth_number.as_deref() {
        if let Some(diag) = latest_for_patient_tooth(conn, &event.patient_id, tooth_number)? {
            return Ok(Some(ResolvedTarget {
                tooth_diagnosis_id: diag.id,
                method: ResolutionMethod::PatientTooth,
                inferred: true,
            }));
        }
    }

    Ok(None)
}

fn resolve_by_treatment_text(
    conn: &Connection,
    event: &ClinicalEvent,
) -> Result<Resolution, DatabaseError> {
    let diagnoses = list_tooth_diagnoses_for_patient(conn, &event.patient_id)?;
    let candidates: Vec<&crate::models::ToothDiagnosis> = diagnoses
        .iter()
        .filter(|d| {
            d.recommended_treatment
                .as_deref()
                .is_some_and(|rec| text_plausibly_matches(&event.label, rec))
        })
        .collect();

    match candidates.len() {
        0 => Ok(Resolution::NoTarget),
        1 => Ok(Resolution::Targets(vec![ResolvedTarget {
            tooth_diagnosis_id: candidates[0].id,
            method: ResolutionMethod::TreatmentText,
            inferred: true,
        }])),
        n => Ok(Resolution::Ambiguous { candidates: n }),
    }
}

/// Case-insensitive containment either way, so "Filling" matches a
/// recommendation of "composite filling" and vice versa.
fn text_plausibly_matches(label: &str, recommended: &str) -> bool {
    let label = label.trim().to_lowercase();
    let recommended = recommended.trim().to_lowercase();
    if label.is_empty() || recommended.is_empty() {
        return false;
    }
    label.contains(&recommended) || recommended.contains(&label)
}
