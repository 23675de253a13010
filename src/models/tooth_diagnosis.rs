use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ToothStatus;

/// One row per (patient, tooth, diagnosis episode).
///
/// `color_code` is derived state: it must always equal
/// `rules::color_for(status)`. The color-integrity pass reasserts this
/// for rows written outside the reconciler. Rows are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToothDiagnosis {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Two-digit FDI tooth designation, "11".."48".
    pub tooth_number: String,
    pub status: ToothStatus,
    pub primary_diagnosis: String,
    pub recommended_treatment: Option<String>,
    pub color_code: String,
    pub follow_up_required: bool,
    pub consultation_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
