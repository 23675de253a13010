use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::TreatmentStatus;
use crate::models::Treatment;

const COLUMNS: &str = "id, patient_id, treatment_type, tooth_number, tooth_diagnosis_id, \
     consultation_id, appointment_id, provider_id, status, created_at, updated_at";

pub fn insert_treatment(conn: &Connection, treatment: &Treatment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO treatments (id, patient_id, treatment_type, tooth_number,
         tooth_diagnosis_id, consultation_id, appointment_id, provider_id, status,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            treatment.id.to_string(),
            treatment.patient_id.to_string(),
            treatment.treatment_type,
            treatment.tooth_number,
            treatment.tooth_diagnosis_id.map(|id| id.to_string()),
            treatment.consultation_id.map(|id| id.to_string()),
            treatment.appointment_id.map(|id| id.to_string()),
            treatment.provider_id.map(|id| id.to_string()),
            treatment.status.as_str(),
            fmt_ts(treatment.created_at),
            fmt_ts(treatment.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_treatment(conn: &Connection, id: &Uuid) -> Result<Option<Treatment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM treatments WHERE id = ?1"))?;

    let result = stmt.query_row(params![id.to_string()], map_row);
    match result {
        Ok(row) => Ok(Some(treatment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_treatments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Treatment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM treatments
         WHERE patient_id = ?1
         ORDER BY created_at"
    ))?;

    let rows = stmt.query_map(params![patient_id.to_string()], map_row)?;
    treatment_rows_to_vec(rows)
}

/// All completed treatments, for the event-replay pass.
pub fn list_completed_treatments(conn: &Connection) -> Result<Vec<Treatment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM treatments WHERE status = 'completed'"
    ))?;

    let rows = stmt.query_map([], map_row)?;
    treatment_rows_to_vec(rows)
}

/// Most recently updated treatment linked to a diagnosis; the overview
/// shows this one when several exist.
pub fn latest_treatment_for_diagnosis(
    conn: &Connection,
    tooth_diagnosis_id: &Uuid,
) -> Result<Option<Treatment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM treatments
         WHERE tooth_diagnosis_id = ?1
         ORDER BY updated_at DESC, rowid DESC
         LIMIT 1"
    ))?;

    let result = stmt.query_row(params![tooth_diagnosis_id.to_string()], map_row);
    match result {
        Ok(row) => Ok(Some(treatment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn treatment_exists_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM treatments WHERE appointment_id = ?1",
        params![appointment_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Set the treatment status and bump `updated_at`. Returns the refreshed
/// row, or None if the id is unknown.
pub fn set_treatment_status(
    conn: &Connection,
    id: &Uuid,
    status: TreatmentStatus,
    now: NaiveDateTime,
) -> Result<Option<Treatment>, DatabaseError> {
    let affected = conn.execute(
        "UPDATE treatments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_ts(now), id.to_string()],
    )?;
    if affected == 0 {
        return Ok(None);
    }
    get_treatment(conn, id)
}

type TreatmentRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
);

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TreatmentRow> {
    Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, Option<String>>(3)?,
        row.get::<_, Option<String>>(4)?,
        row.get::<_, Option<String>>(5)?,
        row.get::<_, Option<String>>(6)?,
        row.get::<_, Option<String>>(7)?,
        row.get::<_, String>(8)?,
        row.get::<_, String>(9)?,
        row.get::<_, String>(10)?,
    ))
}

fn treatment_from_row(row: TreatmentRow) -> Result<Treatment, DatabaseError> {
    let (
        id,
        patient_id,
        treatment_type,
        tooth_number,
        tooth_diagnosis_id,
        consultation_id,
        appointment_id,
        provider_id,
        status,
        created_at,
        updated_at,
    ) = row;
    Ok(Treatment {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        treatment_type,
        tooth_number,
        tooth_diagnosis_id: tooth_diagnosis_id.and_then(|s| Uuid::parse_str(&s).ok()),
        consultation_id: consultation_id.and_then(|s| Uuid::parse_str(&s).ok()),
        appointment_id: appointment_id.and_then(|s| Uuid::parse_str(&s).ok()),
        provider_id: provider_id.and_then(|s| Uuid::parse_str(&s).ok()),
        status: TreatmentStatus::from_str(&status)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn treatment_rows_to_vec(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<TreatmentRow>>,
) -> Result<Vec<Treatment>, DatabaseError> {
    let mut treatments = Vec::new();
    for row in rows {
        treatments.push(treatment_from_row(row?)?);
    }
    Ok(treatments)
}
