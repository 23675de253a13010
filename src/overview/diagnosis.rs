use rusqlite::Connection;
use serde::Serialize;

use crate::db::repository::{
    appointment_for_diagnosis_link, get_appointment, latest_treatment_for_diagnosis,
    list_tooth_diagnoses_for_patient, provider_name_or_placeholder,
};
use crate::db::DatabaseError;
use crate::models::enums::{OverviewStatus, ToothStatus};
use crate::models::{Appointment, ToothDiagnosis, Treatment};
use uuid::Uuid;

/// A tooth diagnosis decorated for the chart view.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisOverviewRow {
    pub diagnosis: ToothDiagnosis,
    pub overview_status: OverviewStatus,
    /// Most recently updated treatment linked to this diagnosis, when
    /// several exist.
    pub latest_treatment: Option<Treatment>,
    pub appointment: Option<Appointment>,
    pub provider_name: String,
}

/// Derived display status: settled statuses read as resolved, open ones
/// as monitoring (follow-up pending) or active.
pub fn overview_status(diag: &ToothDiagnosis) -> OverviewStatus {
    match diag.status {
        ToothStatus::Filled
        | ToothStatus::Crown
        | ToothStatus::RootCanal
        | ToothStatus::Implant
        | ToothStatus::Missing
        | ToothStatus::Healthy => OverviewStatus::Resolved,
        _ if diag.follow_up_required => OverviewStatus::Monitoring,
        _ => OverviewStatus::Active,
    }
}

pub fn get_diagnosis_overview(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<DiagnosisOverviewRow>, DatabaseError> {
    let diagnoses = list_tooth_diagnoses_for_patient(conn, patient_id)?;

    let mut rows = Vec::with_capacity(diagnoses.len());
    for diagnosis in diagnoses {
        let latest_treatment = latest_treatment_for_diagnosis(conn, &diagnosis.id)?;
        // Appointment reached through the treatment when it carries one,
        // otherwise through a tooth link pointing at this diagnosis.
        let appointment = match latest_treatment.as_ref().and_then(|t| t.appointment_id) {
            Some(appointment_id) => get_appointment(conn, &appointment_id)?,
            None => appointment_for_diagnosis_link(conn, &diagnosis.id)?,
        };
        let provider_name = provider_name_or_placeholder(
            conn,
            latest_treatment.as_ref().and_then(|t| t.provider_id).as_ref(),
        );

        rows.push(DiagnosisOverviewRow {
            overview_status: overview_status(&diagnosis),
            latest_treatment,
            appointment,
            provider_name,
            diagnosis,
        });
    }
    Ok(rows)
}
