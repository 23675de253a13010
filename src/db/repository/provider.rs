use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::Provider;

pub fn insert_provider(conn: &Connection, provider: &Provider) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO providers (id, name, role) VALUES (?1, ?2, ?3)",
        params![provider.id.to_string(), provider.name, provider.role],
    )?;
    Ok(())
}

pub fn get_provider(conn: &Connection, id: &Uuid) -> Result<Option<Provider>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name, role FROM providers WHERE id = ?1")?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    });

    match result {
        Ok((id, name, role)) => Ok(Some(Provider {
            id: parse_uuid(&id)?,
            name,
            role,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Provider display name for overview rows. Missing identity degrades to
/// a placeholder instead of failing the view.
pub fn provider_name_or_placeholder(conn: &Connection, id: Option<&Uuid>) -> String {
    let Some(id) = id else {
        return "Unassigned".to_string();
    };
    match get_provider(conn, id) {
        Ok(Some(provider)) => provider.name,
        _ => "Unknown provider".to_string(),
    }
}
