pub mod repository;
pub mod sqlite;

pub use repository::*;
pub use sqlite::*;

use thiserror::Error;

/// Errors surfaced by the clinic database layer. Per-record
/// reconciliation problems are outcomes, not errors; these cover actual
/// storage failures and bad references.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid {field} value in store: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration v{version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}
