use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::AppointmentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type: String,
    pub status: AppointmentStatus,
    pub provider_id: Option<Uuid>,
    pub scheduled_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Join row recording which teeth an appointment concerns.
/// `tooth_diagnosis_id`, when present, is a resolution hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentToothLink {
    pub appointment_id: Uuid,
    pub tooth_number: String,
    pub tooth_diagnosis_id: Option<Uuid>,
}
