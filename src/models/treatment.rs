use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::TreatmentStatus;

/// A clinical procedure performed or planned for a patient.
///
/// Linkage to a tooth diagnosis is sparse by nature: sometimes a direct
/// `tooth_diagnosis_id`, sometimes only a tooth number, sometimes nothing
/// beyond the patient. The linkage resolver handles all three.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Treatment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub treatment_type: String,
    pub tooth_number: Option<String>,
    pub tooth_diagnosis_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub status: TreatmentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
