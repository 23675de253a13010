use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Care provider (dentist or assistant) referenced by treatments and
/// appointments. Identity only; scheduling lives on the appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub role: String,
}
