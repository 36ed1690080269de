//! Shared helpers for the integration tests

use dosql::Connection;

/// Opens an in-memory database with an empty `users` table.
pub fn users_database() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory database");
    conn.create_command("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
        .and_then(|mut create| create.execute_non_query(&[]))
        .expect("users table");
    conn
}
