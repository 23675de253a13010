use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{fmt_ts, parse_ts, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::AppointmentStatus;
use crate::models::{Appointment, AppointmentToothLink};

const COLUMNS: &str =
    "id, patient_id, appointment_type, status, provider_id, scheduled_at, updated_at";

pub fn insert_appointment(
    conn: &Connection,
    appointment: &Appointment,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, appointment_type, status, provider_id,
         scheduled_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            appointment.id.to_string(),
            appointment.patient_id.to_string(),
            appointment.appointment_type,
            appointment.status.as_str(),
            appointment.provider_id.map(|id| id.to_string()),
            fmt_ts(appointment.scheduled_at),
            fmt_ts(appointment.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM appointments WHERE id = ?1"))?;

    let result = stmt.query_row(params![id.to_string()], map_row);
    match result {
        Ok(row) => Ok(Some(appointment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_appointments_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM appointments
         WHERE patient_id = ?1
         ORDER BY scheduled_at"
    ))?;

    let rows = stmt.query_map(params![patient_id.to_string()], map_row)?;
    appointment_rows_to_vec(rows)
}

/// All completed appointments, for the event-replay pass.
pub fn list_completed_appointments(conn: &Connection) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM appointments WHERE status = 'completed'"
    ))?;

    let rows = stmt.query_map([], map_row)?;
    appointment_rows_to_vec(rows)
}

/// Set the appointment status and bump `updated_at`. Returns the
/// refreshed row, or None if the id is unknown.
pub fn set_appointment_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
    now: NaiveDateTime,
) -> Result<Option<Appointment>, DatabaseError> {
    let affected = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), fmt_ts(now), id.to_string()],
    )?;
    if affected == 0 {
        return Ok(None);
    }
    get_appointment(conn, id)
}

pub fn insert_tooth_link(
    conn: &Connection,
    link: &AppointmentToothLink,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointment_tooth_links (appointment_id, tooth_number, tooth_diagnosis_id)
         VALUES (?1, ?2, ?3)",
        params![
            link.appointment_id.to_string(),
            link.tooth_number,
            link.tooth_diagnosis_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

pub fn links_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<AppointmentToothLink>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT appointment_id, tooth_number, tooth_diagnosis_id
         FROM appointment_tooth_links
         WHERE appointment_id = ?1
         ORDER BY tooth_number",
    )?;

    let rows = stmt.query_map(params![appointment_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;

    let mut links = Vec::new();
    for row in rows {
        let (appointment_id, tooth_number, tooth_diagnosis_id) = row?;
        links.push(AppointmentToothLink {
            appointment_id: parse_uuid(&appointment_id)?,
            tooth_number,
            tooth_diagnosis_id: tooth_diagnosis_id.and_then(|s| Uuid::parse_str(&s).ok()),
        });
    }
    Ok(links)
}

/// Appointment reachable from a diagnosis through a tooth link; used by
/// the diagnosis overview when no treatment carries the appointment id.
pub fn appointment_for_diagnosis_link(
    conn: &Connection,
    tooth_diagnosis_id: &Uuid,
) -> Result<Option<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.patient_id, a.appointment_type, a.status, a.provider_id,
                a.scheduled_at, a.updated_at
         FROM appointments a
         JOIN appointment_tooth_links l ON l.appointment_id = a.id
         WHERE l.tooth_diagnosis_id = ?1
         ORDER BY a.updated_at DESC, a.rowid DESC
         LIMIT 1",
    )?;

    let result = stmt.query_row(params![tooth_diagnosis_id.to_string()], map_row);
    match result {
        Ok(row) => Ok(Some(appointment_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

type AppointmentRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
);

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get::<_, Option<String>>(4)?,
        row.get::<_, String>(5)?,
        row.get::<_, String>(6)?,
    ))
}

fn appointment_from_row(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
    let (id, patient_id, appointment_type, status, provider_id, scheduled_at, updated_at) = row;
    Ok(Appointment {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        appointment_type,
        status: AppointmentStatus::from_str(&status)?,
        provider_id: provider_id.and_then(|s| Uuid::parse_str(&s).ok()),
        scheduled_at: parse_ts(&scheduled_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn appointment_rows_to_vec(
    rows: rusqlite::MappedRows<
        '_,
        impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<AppointmentRow>,
    >,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut appointments = Vec::new();
    for row in rows {
        appointments.push(appointment_from_row(row?)?);
    }
    Ok(appointments)
}
