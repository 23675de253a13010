pub mod appointment;
pub mod audit;
pub mod patient;
pub mod provider;
pub mod tooth_diagnosis;
pub mod treatment;

pub use appointment::*;
pub use audit::*;
pub use patient::*;
pub use provider::*;
pub use tooth_diagnosis::*;
pub use treatment::*;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::DatabaseError;

/// Timestamps are stored as text at microsecond resolution. The exact
/// stored string doubles as the optimistic-concurrency token on
/// `tooth_diagnoses.updated_at`, so every write must go through `fmt_ts`.
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .unwrap_or_else(|_| {
            tracing::warn!(value = s, "Unparseable stored timestamp, substituting epoch");
            NaiveDateTime::default()
        })
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}
