use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::appointment::{Appointment, AppointmentToothLink};
use super::enums::EventKind;
use super::treatment::Treatment;

/// Inbound clinical event from a treatment or appointment status-change
/// action. Carries whatever linkage the collaborator happened to record;
/// the resolver fills the gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalEvent {
    pub patient_id: Uuid,
    pub kind: EventKind,
    /// Free-text label matched against the status rule table: a treatment
    /// type for treatment events, an appointment type for appointment events.
    pub label: String,
    pub tooth_number: Option<String>,
    pub tooth_diagnosis_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
}

impl ClinicalEvent {
    pub fn from_completed_treatment(treatment: &Treatment) -> Self {
        Self {
            patient_id: treatment.patient_id,
            kind: EventKind::TreatmentCompleted,
            label: treatment.treatment_type.clone(),
            tooth_number: treatment.tooth_number.clone(),
            tooth_diagnosis_id: treatment.tooth_diagnosis_id,
            consultation_id: treatment.consultation_id,
            appointment_id: treatment.appointment_id,
        }
    }

    pub fn from_completed_appointment(appointment: &Appointment) -> Self {
        Self {
            patient_id: appointment.patient_id,
            kind: EventKind::AppointmentCompleted,
            label: appointment.appointment_type.clone(),
            tooth_number: None,
            tooth_diagnosis_id: None,
            consultation_id: None,
            appointment_id: Some(appointment.id),
        }
    }

    /// Narrow an appointment event to one of its tooth links so the
    /// resolver can re-enter the direct-id and tooth-number steps.
    pub fn narrowed_to_link(&self, link: &AppointmentToothLink) -> Self {
        Self {
            tooth_number: Some(link.tooth_number.clone()),
            tooth_diagnosis_id: link.tooth_diagnosis_id,
            appointment_id: None,
            ..self.clone()
        }
    }
}
