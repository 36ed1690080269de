/// # Test Utilities Module
///
/// Shared fixtures for unit tests: isolated in-memory databases with a
/// small `users` schema.

use crate::core::db::Connection;

/// Standard schema used across the unit tests
pub const USERS_SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT,
        active BOOLEAN DEFAULT 1,
        born DATE,
        created_at DATETIME
    )
";

/// Opens a fresh in-memory database holding `users` with Alice (id 1) and Bob (id 2).
pub fn users_fixture() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory database");
    run(&conn, USERS_SCHEMA);
    run(
        &conn,
        "INSERT INTO users (name, email, active, born, created_at)
         VALUES ('Alice', 'alice@example.com', 1, '1990-05-17', '2008-02-14 09:15:00')",
    );
    run(
        &conn,
        "INSERT INTO users (name, email, active, born, created_at)
         VALUES ('Bob', NULL, 0, '1985-11-02', '2009-07-01 18:00:00')",
    );
    conn
}

fn run(conn: &Connection, sql: &str) {
    conn.create_command(sql)
        .and_then(|mut command| command.execute_non_query(&[]))
        .unwrap_or_else(|e| panic!("fixture statement failed: {e}\n{sql}"));
}
