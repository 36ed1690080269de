/// Command Execution Module
///
/// A `Command` is one parameterized SQL statement bound to a `Connection`.
/// Both execution modes time the statement and report it through the logger
/// gateway when the current logger admits DEBUG records.
use super::connection::Connection;
use super::query::{format_log_record, interpolate, StatementType};
use super::reader::Reader;
use super::value::Value;
use crate::core::{DoError, Result};
use crate::logger;
use rusqlite::Statement;
use std::time::Instant;
use tracing::warn;

/// Outcome of a non-query execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonQueryResult {
    /// Rows inserted, updated or deleted by the statement
    pub affected_rows: usize,
    /// Rowid of the last inserted row, when the statement inserted any
    pub last_insert_id: Option<i64>,
}

/// A SQL statement with `?` placeholders, executable on its connection.
///
/// The statement is compiled on first execution and reused afterwards;
/// every execution rebinds all parameters.
#[derive(Debug)]
pub struct Command<'conn> {
    connection: &'conn Connection,
    text: String,
    statement: Option<Statement<'conn>>,
}

impl<'conn> Command<'conn> {
    pub(crate) fn new(connection: &'conn Connection, text: &str) -> Self {
        Command {
            connection,
            text: text.to_string(),
            statement: None,
        }
    }

    /// The SQL template this command executes
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Executes the statement and returns a reader over its rows
    ///
    /// # Errors
    ///
    /// - `DoError::Binding` if `params` does not match the placeholder count
    /// - `DoError::Query` if the statement is malformed or rejected
    /// - `DoError::Connection` if the session is closed or unusable
    pub fn execute_reader(&mut self, params: &[Value]) -> Result<Reader<'_>> {
        let Command {
            connection,
            text,
            statement,
        } = self;
        let (connection, text) = (*connection, text.as_str());

        let start = Instant::now();
        let statement = match Self::prepare(statement, connection, text) {
            Ok(statement) => statement,
            Err(e) => return Err(Self::report_failure(start, connection, text, params, e)),
        };
        bind(statement, params)?;

        let field_names: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let reader = Reader::open(statement.raw_query(), field_names);

        log_execution(start, text, params);
        reader.map_err(|e| {
            warn!("Statement failed: {}", e);
            e
        })
    }

    /// Executes the statement without producing a row stream
    ///
    /// Statements that do return rows are run to completion and their rows
    /// discarded.
    ///
    /// # Errors
    ///
    /// Same as [`Command::execute_reader`].
    pub fn execute_non_query(&mut self, params: &[Value]) -> Result<NonQueryResult> {
        let Command {
            connection,
            text,
            statement,
        } = self;
        let (connection, text) = (*connection, text.as_str());

        let start = Instant::now();
        let statement = match Self::prepare(statement, connection, text) {
            Ok(statement) => statement,
            Err(e) => return Err(Self::report_failure(start, connection, text, params, e)),
        };
        bind(statement, params)?;

        let outcome = connection.session().and_then(|session| {
            let before = ChangeMark::take(session)?;
            let count = run_to_completion(statement)?;
            let after = ChangeMark::take(session)?;

            // Counters only move when rows were written
            if after.total_changes == before.total_changes {
                return Ok(NonQueryResult {
                    affected_rows: 0,
                    last_insert_id: None,
                });
            }
            let inserted = after.last_rowid != before.last_rowid
                || StatementType::from_sql(text) == StatementType::Insert;
            Ok(NonQueryResult {
                affected_rows: count,
                last_insert_id: inserted.then_some(after.last_rowid),
            })
        });

        log_execution(start, text, params);
        outcome.map_err(|e| {
            warn!("Statement failed: {}", e);
            e
        })
    }

    fn prepare<'s>(
        slot: &'s mut Option<Statement<'conn>>,
        connection: &'conn Connection,
        text: &str,
    ) -> Result<&'s mut Statement<'conn>> {
        if slot.is_none() {
            let session = connection.session()?;
            *slot = Some(session.prepare(text).map_err(DoError::from_sqlite)?);
        }
        slot.as_mut()
            .ok_or_else(|| DoError::State("Statement was not prepared".to_string()))
    }

    fn report_failure(
        start: Instant,
        connection: &Connection,
        text: &str,
        params: &[Value],
        e: DoError,
    ) -> DoError {
        // A closed session never reached the engine
        if connection.is_open() {
            log_execution(start, text, params);
        }
        warn!("Statement failed: {}", e);
        e
    }
}

/// Binds every parameter, checking the count against the statement first.
///
/// Only anonymous `?` placeholders are accepted; numbered (`?NNN`) and named
/// (`:name`, `@name`, `$name`) forms cannot be substituted into the log record.
fn bind(statement: &mut Statement<'_>, params: &[Value]) -> Result<()> {
    let expected = statement.parameter_count();
    for index in 1..=expected {
        if let Some(name) = statement.parameter_name(index) {
            return Err(DoError::Binding(format!(
                "Unsupported placeholder '{}', use '?'",
                name
            )));
        }
    }
    if expected != params.len() {
        return Err(DoError::Binding(format!(
            "Statement expects {} parameter(s), {} given",
            expected,
            params.len()
        )));
    }
    for (index, value) in params.iter().enumerate() {
        statement
            .raw_bind_parameter(index + 1, value)
            .map_err(|e| DoError::Binding(e.to_string()))?;
    }
    Ok(())
}

/// Runs a bound statement to completion.
///
/// Returns SQLite's change count for statements without a result set, and
/// the number of rows stepped otherwise (one per written row for RETURNING).
fn run_to_completion(statement: &mut Statement<'_>) -> Result<usize> {
    if statement.column_count() == 0 {
        return statement.raw_execute().map_err(DoError::from_sqlite);
    }
    let mut rows = statement.raw_query();
    let mut count = 0;
    while rows.next().map_err(DoError::from_sqlite)?.is_some() {
        count += 1;
    }
    Ok(count)
}

/// Session counters sampled around one execution.
struct ChangeMark {
    total_changes: i64,
    last_rowid: i64,
}

impl ChangeMark {
    fn take(session: &rusqlite::Connection) -> Result<Self> {
        let total_changes = session
            .query_row("SELECT total_changes()", [], |row| row.get(0))
            .map_err(DoError::from_sqlite)?;
        Ok(ChangeMark {
            total_changes,
            last_rowid: session.last_insert_rowid(),
        })
    }
}

/// Reports one executed statement to the current logger.
fn log_execution(start: Instant, text: &str, params: &[Value]) {
    let logger = logger::current();
    if !logger.debug_enabled() {
        return;
    }
    let query = interpolate(text, params);
    logger.debug(&format_log_record(start.elapsed(), &query));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{with_logger, MemoryLogger};
    use crate::test_utils::users_fixture;
    use std::sync::Arc;

    #[test]
    fn test_non_query_reports_changes() {
        let conn = users_fixture();
        let mut insert = conn
            .create_command("INSERT INTO users (name) VALUES (?)")
            .unwrap();

        let first = insert.execute_non_query(&["Carol".into()]).unwrap();
        assert_eq!(first.affected_rows, 1);
        let second = insert.execute_non_query(&["Dave".into()]).unwrap();
        assert_eq!(second.last_insert_id, first.last_insert_id.map(|id| id + 1));

        let mut update = conn
            .create_command("UPDATE users SET active = ? WHERE name <> ?")
            .unwrap();
        let result = update.execute_non_query(&[false.into(), "Alice".into()]).unwrap();
        assert_eq!(result.affected_rows, 3);
        assert_eq!(result.last_insert_id, None);

        let mut create = conn.create_command("CREATE TABLE audit (id INTEGER)").unwrap();
        assert_eq!(create.execute_non_query(&[]).unwrap().affected_rows, 0);
    }

    #[test]
    fn test_non_query_accepts_row_returning_statements() {
        let conn = users_fixture();
        let mut select = conn.create_command("SELECT * FROM users").unwrap();
        let result = select.execute_non_query(&[]).unwrap();
        assert_eq!(result.affected_rows, 0);
    }

    #[test]
    fn test_returning_insert_counts_written_rows() {
        let conn = users_fixture();
        let mut insert = conn
            .create_command("INSERT INTO users (name) VALUES (?) RETURNING id")
            .unwrap();

        let result = insert.execute_non_query(&["Carol".into()]).unwrap();
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.last_insert_id, Some(3));
    }

    #[test]
    fn test_changes_ignore_leading_keyword() {
        let conn = users_fixture();

        let mut cte_insert = conn
            .create_command("WITH v(n) AS (SELECT ?) INSERT INTO users (name) SELECT n FROM v")
            .unwrap();
        let result = cte_insert.execute_non_query(&["Carol".into()]).unwrap();
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.last_insert_id, Some(3));

        let mut commented_update = conn
            .create_command("-- bump\nUPDATE users SET name = ? WHERE id = 1")
            .unwrap();
        let result = commented_update.execute_non_query(&["Alicia".into()]).unwrap();
        assert_eq!(result.affected_rows, 1);
        assert_eq!(result.last_insert_id, None);

        let mut commented_delete = conn
            .create_command("/* purge */ DELETE FROM users WHERE active = ?")
            .unwrap();
        let result = commented_delete.execute_non_query(&[false.into()]).unwrap();
        assert_eq!(result.affected_rows, 1);

        // Nothing matched, so the previous count must not leak through
        let result = commented_delete.execute_non_query(&[false.into()]).unwrap();
        assert_eq!(result.affected_rows, 0);
    }

    #[test]
    fn test_ignored_insert_reports_no_id() {
        let conn = users_fixture();
        let mut insert = conn
            .create_command("INSERT OR IGNORE INTO users (id, name) VALUES (?, ?)")
            .unwrap();

        let result = insert.execute_non_query(&[1.into(), "Duplicate".into()]).unwrap();
        assert_eq!(result.affected_rows, 0);
        assert_eq!(result.last_insert_id, None);
    }

    #[test]
    fn test_numbered_and_named_placeholders_rejected() {
        let conn = users_fixture();
        let memory = Arc::new(MemoryLogger::new(0));
        with_logger(memory.clone(), || {
            let mut numbered = conn
                .create_command("SELECT * FROM users WHERE name = ?1 OR id = ?1")
                .unwrap();
            match numbered.execute_reader(&["Blah".into()]) {
                Err(DoError::Binding(msg)) => assert!(msg.contains("?1")),
                other => panic!("Expected Binding error, got {:?}", other),
            }

            for sql in [
                "SELECT * FROM users WHERE name = :name",
                "SELECT * FROM users WHERE name = @name",
                "SELECT * FROM users WHERE name = $name",
            ] {
                let mut named = conn.create_command(sql).unwrap();
                assert!(matches!(
                    named.execute_non_query(&["Alice".into()]),
                    Err(DoError::Binding(_))
                ));
            }
        });
        assert_eq!(memory.debug_calls(), 0);
    }

    #[test]
    fn test_session_failures_are_logged_while_open() {
        let conn = users_fixture();
        let mut closed = Connection::open_in_memory().unwrap();
        closed.close();

        let memory = Arc::new(MemoryLogger::new(0));
        with_logger(memory.clone(), || {
            let busy = DoError::Connection("database is locked".to_string());
            let e = Command::report_failure(Instant::now(), &conn, "SELECT 1", &[], busy);
            assert!(matches!(e, DoError::Connection(_)));

            let gone = DoError::Connection("Connection is closed".to_string());
            Command::report_failure(Instant::now(), &closed, "SELECT 2", &[], gone);
        });

        let records = memory.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].ends_with(") SELECT 1"));
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let conn = users_fixture();
        let memory = Arc::new(MemoryLogger::new(0));
        with_logger(memory.clone(), || {
            let mut insert = conn
                .create_command("INSERT INTO users (name) VALUES (?)")
                .unwrap();

            match insert.execute_non_query(&[]) {
                Err(DoError::Binding(msg)) => assert!(msg.contains("expects 1")),
                other => panic!("Expected Binding error, got {:?}", other),
            }
            assert!(matches!(
                insert.execute_reader(&["a".into(), "b".into()]),
                Err(DoError::Binding(_))
            ));
        });
        assert_eq!(memory.debug_calls(), 0);
    }

    #[test]
    fn test_malformed_sql_is_query_error_and_logged() {
        let conn = users_fixture();
        let memory = Arc::new(MemoryLogger::new(0));
        with_logger(memory.clone(), || {
            let mut bad = conn.create_command("SELEC * FROM users").unwrap();
            assert!(matches!(bad.execute_reader(&[]), Err(DoError::Query(_))));

            let mut missing = conn.create_command("SELECT * FROM nonexistent_table").unwrap();
            match missing.execute_non_query(&[]) {
                Err(DoError::Query(msg)) => assert!(msg.contains("no such table")),
                other => panic!("Expected Query error, got {:?}", other),
            }
        });
        assert_eq!(memory.debug_calls(), 2);
        assert!(memory.records()[0].ends_with(") SELEC * FROM users"));
    }

    #[test]
    fn test_constraint_violation_is_query_error() {
        let conn = users_fixture();
        let mut insert = conn.create_command("INSERT INTO users (id, name) VALUES (?, ?)").unwrap();
        let result = insert.execute_non_query(&[1.into(), "Duplicate".into()]);
        assert!(matches!(result, Err(DoError::Query(_))));
    }

    #[test]
    fn test_command_rebinds_between_executions() {
        let conn = users_fixture();
        let memory = Arc::new(MemoryLogger::new(0));
        with_logger(memory.clone(), || {
            let mut select = conn.create_command("SELECT name FROM users WHERE id = ?").unwrap();

            {
                let mut reader = select.execute_reader(&[1.into()]).unwrap();
                assert_eq!(reader.fetch_row().unwrap(), Some(vec![Value::Text("Alice".into())]));
            }
            let mut reader = select.execute_reader(&[2.into()]).unwrap();
            assert_eq!(reader.fetch_row().unwrap(), Some(vec![Value::Text("Bob".into())]));
        });

        let records = memory.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].ends_with(") SELECT name FROM users WHERE id = 1"));
        assert!(records[1].ends_with(") SELECT name FROM users WHERE id = 2"));
    }

    #[test]
    fn test_cancelled_statement_is_query_error() {
        let conn = users_fixture();
        let canceller = conn.canceller().unwrap();
        let mut slow = conn
            .create_command(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n) SELECT count(*) FROM n",
            )
            .unwrap();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            canceller.cancel();
        });
        let result = slow.execute_non_query(&[]);
        handle.join().unwrap();

        match result {
            Err(DoError::Query(msg)) => assert!(msg.contains("interrupt")),
            other => panic!("Expected Query error, got {:?}", other),
        }
    }
}
