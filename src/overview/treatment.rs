use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::repository::{
    get_appointment, links_for_appointment, list_appointments_for_patient,
    list_treatments_for_patient, provider_name_or_placeholder, treatment_exists_for_appointment,
};
use crate::db::DatabaseError;
use crate::models::enums::TreatmentStatus;
use crate::models::Appointment;
use crate::rules;

/// One line of the treatment view: a real treatment row, or a
/// pseudo-treatment synthesized from a treatment-like appointment that
/// has no treatment row, so every clinically relevant appointment
/// appears exactly once across the two overviews.
#[derive(Debug, Clone, Serialize)]
pub struct TreatmentOverviewRow {
    /// None for synthesized rows.
    pub treatment_id: Option<Uuid>,
    pub treatment_type: String,
    pub status: TreatmentStatus,
    pub tooth_number: Option<String>,
    pub appointment: Option<Appointment>,
    pub provider_name: String,
    pub synthesized: bool,
}

pub fn get_treatment_overview(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<TreatmentOverviewRow>, DatabaseError> {
    let mut rows = Vec::new();

    for treatment in list_treatments_for_patient(conn, patient_id)? {
        let appointment = match treatment.appointment_id {
            Some(appointment_id) => get_appointment(conn, &appointment_id)?,
            None => None,
        };
        rows.push(TreatmentOverviewRow {
            treatment_id: Some(treatment.id),
            treatment_type: treatment.treatment_type.clone(),
            status: treatment.status,
            tooth_number: treatment.tooth_number.clone(),
            appointment,
            provider_name: provider_name_or_placeholder(conn, treatment.provider_id.as_ref()),
            synthesized: false,
        });
    }

    for appointment in list_appointments_for_patient(conn, patient_id)? {
        if !rules::is_treatment_like(&appointment.appointment_type) {
            continue;
        }
        if treatment_exists_for_appointment(conn, &appointment.id)? {
            continue;
        }

        let links = links_for_appointment(conn, &appointment.id)?;
        let tooth_number = match links.as_slice() {
            [only] => Some(only.tooth_number.clone()),
            _ => None,
        };
        rows.push(TreatmentOverviewRow {
            treatment_id: None,
            treatment_type: appointment.appointment_type.clone(),
            status: appointment.status.as_treatment_status(),
            tooth_number,
            provider_name: provider_name_or_placeholder(conn, appointment.provider_id.as_ref()),
            appointment: Some(appointment),
            synthesized: true,
        });
    }

    Ok(rows)
}
