use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::fmt_ts;
use crate::db::DatabaseError;

/// One resolver decision, recorded so best-effort matches can be
/// reviewed by a human later.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LinkageAuditEntry {
    pub timestamp: NaiveDateTime,
    pub patient_id: Uuid,
    pub event_kind: String,
    pub event_label: String,
    pub tooth_diagnosis_id: Option<Uuid>,
    /// Resolution method: direct_id, consultation_tooth, patient_tooth,
    /// appointment_link, or treatment_text.
    pub method: String,
    /// How the rule table matched the label: exact or substring.
    pub match_kind: Option<String>,
    pub inferred: bool,
}

pub fn insert_linkage_audit(
    conn: &Connection,
    entry: &LinkageAuditEntry,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO linkage_audit (timestamp, patient_id, event_kind, event_label,
         tooth_diagnosis_id, method, match_kind, inferred)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            fmt_ts(entry.timestamp),
            entry.patient_id.to_string(),
            entry.event_kind,
            entry.event_label,
            entry.tooth_diagnosis_id.map(|id| id.to_string()),
            entry.method,
            entry.match_kind,
            entry.inferred as i32,
        ],
    )?;
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_linkage_audit(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM linkage_audit WHERE timestamp < datetime('now', ?1)",
        params![format!("-{retention_days} days")],
    )?;
    Ok(deleted)
}

/// Inferred linkages for a patient, newest first.
/// Returns (timestamp, event_label, tooth_diagnosis_id, method) tuples.
pub fn query_inferred_linkages(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<(String, String, Option<String>, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, event_label, tooth_diagnosis_id, method FROM linkage_audit
         WHERE patient_id = ?1 AND inferred = 1
         ORDER BY timestamp DESC",
    )?;
    let rows = stmt
        .query_map(params![patient_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
