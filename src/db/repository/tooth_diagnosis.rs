use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::ToothStatus;
use crate::models::ToothDiagnosis;

const COLUMNS: &str = "id, patient_id, tooth_number, status, primary_diagnosis, \
     recommended_treatment, color_code, follow_up_required, consultation_id, \
     created_at, updated_at";

pub fn insert_tooth_diagnosis(
    conn: &Connection,
    diag: &ToothDiagnosis,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO tooth_diagnoses (id, patient_id, tooth_number, status, primary_diagnosis,
         recommended_treatment, color_code, follow_up_required, consultation_id,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            diag.id.to_string(),
            diag.patient_id.to_string(),
            diag.tooth_number,
            diag.status.as_str(),
            diag.primary_diagnosis,
            diag.recommended_treatment,
            diag.color_code,
            diag.follow_up_required as i32,
            diag.consultation_id.map(|id| id.to_string()),
            fmt_ts(diag.created_at),
            fmt_ts(diag.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_tooth_diagnosis(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ToothDiagnosis>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM tooth_diagnoses WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], map_row);
    match result {
        Ok(row) => Ok(Some(diagnosis_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_tooth_diagnoses_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<ToothDiagnosis>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM tooth_diagnoses
         WHERE patient_id = ?1
         ORDER BY tooth_number, created_at"
    ))?;

    let rows = stmt.query_map(params![patient_id.to_string()], map_row)?;
    diagnosis_rows_to_vec(rows)
}

pub fn list_all_tooth_diagnoses(conn: &Connection) -> Result<Vec<ToothDiagnosis>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM tooth_diagnoses"))?;
    let rows = stmt.query_map([], map_row)?;
    diagnosis_rows_to_vec(rows)
}

/// Most recently updated diagnosis for a patient/tooth pair; ties broken
/// by insertion order, most recent first. Best-effort fallback used by
/// the resolver; callers must flag the result as inferred.
pub fn latest_for_patient_tooth(
    conn: &Connection,
    patient_id: &Uuid,
    tooth_number: &str,
) -> Result<Option<ToothDiagnosis>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM tooth_diagnoses
         WHERE patient_id = ?1 AND tooth_number = ?2
         ORDER BY updated_at DESC, rowid DESC
         LIMIT 1"
    ))?;

    let result = stmt.query_row(params![patient_id.to_string(), tooth_number], map_row);
    match result {
        Ok(row) => Ok(Some(diagnosis_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn find_by_consultation_and_tooth(
    conn: &Connection,
    consultation_id: &Uuid,
    tooth_number: &str,
) -> Result<Option<ToothDiagnosis>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM tooth_diagnoses
         WHERE consultation_id = ?1 AND tooth_number = ?2
         ORDER BY updated_at DESC, rowid DESC
         LIMIT 1"
    ))?;

    let result = stmt.query_row(params![consultation_id.to_string(), tooth_number], map_row);
    match result {
        Ok(row) => Ok(Some(diagnosis_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Optimistic-concurrency write of the reconciled fields. The update only
/// lands if `updated_at` still holds the value the caller read; returns
/// the number of rows affected (0 means the row moved or is gone).
pub fn guarded_status_update(
    conn: &Connection,
    next: &ToothDiagnosis,
    expected_updated_at: NaiveDateTime,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE tooth_diagnoses
         SET status = ?1, color_code = ?2, follow_up_required = ?3, updated_at = ?4
         WHERE id = ?5 AND updated_at = ?6",
        params![
            next.status.as_str(),
            next.color_code,
            next.follow_up_required as i32,
            fmt_ts(next.updated_at),
            next.id.to_string(),
            fmt_ts(expected_updated_at),
        ],
    )?;
    Ok(affected)
}

/// Repair the derived color only. Guarded on the status the color was
/// derived from, so a repair from a stale snapshot lands on zero rows
/// instead of stamping the wrong color after a concurrent reconcile.
/// Deliberately does not touch `updated_at`.
pub fn set_color_code(
    conn: &Connection,
    id: &Uuid,
    color: &str,
    derived_from: ToothStatus,
) -> Result<usize, DatabaseError> {
    let affected = conn.execute(
        "UPDATE tooth_diagnoses SET color_code = ?1 WHERE id = ?2 AND status = ?3",
        params![color, id.to_string(), derived_from.as_str()],
    )?;
    Ok(affected)
}

type DiagnosisRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    i32,
    Option<String>,
    String,
    String,
);

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DiagnosisRow> {
    Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get::<_, String>(4)?,
        row.get::<_, Option<String>>(5)?,
        row.get::<_, String>(6)?,
        row.get::<_, i32>(7)?,
        row.get::<_, Option<String>>(8)?,
        row.get::<_, String>(9)?,
        row.get::<_, String>(10)?,
    ))
}

fn diagnosis_from_row(row: DiagnosisRow) -> Result<ToothDiagnosis, DatabaseError> {
    let (
        id,
        patient_id,
        tooth_number,
        status,
        primary_diagnosis,
        recommended_treatment,
        color_code,
        follow_up_required,
        consultation_id,
        created_at,
        updated_at,
    ) = row;
    Ok(ToothDiagnosis {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        tooth_number,
        status: ToothStatus::from_str(&status)?,
        primary_diagnosis,
        recommended_treatment,
        color_code,
        follow_up_required: follow_up_required != 0,
        consultation_id: consultation_id.and_then(|s| Uuid::parse_str(&s).ok()),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn diagnosis_rows_to_vec(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<DiagnosisRow>>,
) -> Result<Vec<ToothDiagnosis>, DatabaseError> {
    let mut diagnoses = Vec::new();
    for row in rows {
        diagnoses.push(diagnosis_from_row(row?)?);
    }
    Ok(diagnoses)
}
