/// Connection Management Module
///
/// A `Connection` owns one SQLite session and hands out `Command`s bound to it.
use super::command::Command;
use crate::core::{DoError, Result};
use rusqlite::OpenFlags;
use std::time::Duration;
use tracing::{debug, warn};

/// Already-validated description of the database to open.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    /// Path to the SQLite database file, or ":memory:"
    pub path: String,
    /// How long to wait on a locked database before failing
    pub busy_timeout_ms: u64,
    /// Enforce foreign key constraints
    pub foreign_keys: bool,
    /// Open without write access
    pub read_only: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            path: ":memory:".to_string(),
            busy_timeout_ms: 5000,
            foreign_keys: true,
            read_only: false,
        }
    }
}

impl ConnectionOptions {
    pub fn new(path: impl Into<String>) -> Self {
        ConnectionOptions {
            path: path.into(),
            ..ConnectionOptions::default()
        }
    }
}

/// An open (or closed) database session.
#[derive(Debug)]
pub struct Connection {
    /// Active session (None once closed)
    session: Option<rusqlite::Connection>,
    /// Path of the database file (None for in-memory databases)
    path: Option<String>,
}

impl Connection {
    /// Opens the database described by `options`
    ///
    /// # Errors
    ///
    /// Returns `DoError::Connection` when the file cannot be opened or is not
    /// a SQLite database.
    pub fn open(options: &ConnectionOptions) -> Result<Self> {
        let flags = if options.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };

        let session = rusqlite::Connection::open_with_flags(&options.path, flags)
            .map_err(|e| DoError::Connection(format!("Failed to open {}: {}", options.path, e)))?;

        session
            .busy_timeout(Duration::from_millis(options.busy_timeout_ms))
            .map_err(|e| DoError::Connection(e.to_string()))?;
        session
            .pragma_update(None, "foreign_keys", options.foreign_keys)
            .map_err(|e| DoError::Connection(e.to_string()))?;

        // SQLite opens lazily; touch the schema so unreadable files fail here
        session
            .query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| DoError::Connection(format!("Failed to open {}: {}", options.path, e)))?;

        debug!("Opened database {}", options.path);

        Ok(Connection {
            session: Some(session),
            path: if options.path != ":memory:" {
                Some(options.path.clone())
            } else {
                None
            },
        })
    }

    /// Opens a database file with default options
    pub fn open_path(path: &str) -> Result<Self> {
        Connection::open(&ConnectionOptions::new(path))
    }

    /// Opens a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Connection::open(&ConnectionOptions::default())
    }

    /// Creates a command for `sql`. No I/O happens until it is executed.
    ///
    /// # Errors
    ///
    /// Returns `DoError::State` if the connection has been closed.
    pub fn create_command(&self, sql: &str) -> Result<Command<'_>> {
        if !self.is_open() {
            return Err(DoError::State("Cannot create a command on a closed connection".to_string()));
        }
        Ok(Command::new(self, sql))
    }

    /// Closes the session. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                if let Err((_, e)) = session.close() {
                    warn!("Error while closing database: {}", e);
                }
                debug!("Closed database {}", self.path.as_deref().unwrap_or(":memory:"));
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Returns a handle that can interrupt statements running on this session
    pub fn canceller(&self) -> Result<QueryCanceller> {
        Ok(QueryCanceller::new(self.session()?.get_interrupt_handle()))
    }

    pub(crate) fn session(&self) -> Result<&rusqlite::Connection> {
        self.session
            .as_ref()
            .ok_or_else(|| DoError::Connection("Connection is closed".to_string()))
    }
}

/// A canceller that can be used to interrupt queries from another thread
pub struct QueryCanceller {
    interrupt_handle: rusqlite::InterruptHandle,
}

impl QueryCanceller {
    fn new(interrupt_handle: rusqlite::InterruptHandle) -> Self {
        QueryCanceller { interrupt_handle }
    }

    /// Interrupts the statement currently running, if any
    pub fn cancel(&self) {
        self.interrupt_handle.interrupt();
    }
}
