/// dosql Error Module
///
/// This module defines the error taxonomy shared by connections, commands,
/// readers and configuration loading.
use rusqlite::ErrorCode;
use thiserror::Error;

/// Error type for every fallible dosql operation.
///
/// - Session problems (closed, busy, unreadable file) are `Connection`
/// - Operations on closed resources are `State`
/// - Parameter or field-type count mismatches are `Binding`
/// - Statements rejected by SQLite are `Query`
#[derive(Error, Debug)]
pub enum DoError {
    /// The underlying session is unusable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation attempted on a closed or otherwise invalid resource
    #[error("State error: {0}")]
    State(String),

    /// Bound parameters or declared field types do not match the statement
    #[error("Binding error: {0}")]
    Binding(String),

    /// SQL rejected by the engine (syntax, missing tables, constraints, interrupts)
    #[error("Query error: {0}")]
    Query(String),

    /// A row value could not be converted to its declared field type
    #[error("Typecast error: {0}")]
    Typecast(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DoError {
    /// Classifies a SQLite failure as a session problem or a statement problem.
    pub(crate) fn from_sqlite(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure
                | ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly
                | ErrorCode::DatabaseCorrupt,
            ) => DoError::Connection(err.to_string()),
            _ => DoError::Query(err.to_string()),
        }
    }
}

/// Type alias for Result to use DoError as the error type.
pub type Result<T> = std::result::Result<T, DoError>;
