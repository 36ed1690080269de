/// Query Text Module
///
/// Helpers that work on SQL text without touching the database: statement
/// classification and rendering of parameterized statements for the log.
use super::value::Value;
use std::time::Duration;

/// Represents different SQL statement types for introspection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    /// SELECT statement (also WITH ... SELECT, VALUES, PRAGMA and EXPLAIN)
    Select,
    /// INSERT or REPLACE statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// CREATE, DROP or ALTER statement
    Ddl,
    /// BEGIN/COMMIT/ROLLBACK transaction commands
    Transaction,
    /// Other statement types
    Other,
}

impl StatementType {
    /// Determines the statement type from its leading keyword
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .next()
            .unwrap_or("")
            .to_uppercase();

        match keyword.as_str() {
            "SELECT" | "WITH" | "VALUES" | "PRAGMA" | "EXPLAIN" => StatementType::Select,
            "INSERT" | "REPLACE" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "CREATE" | "DROP" | "ALTER" => StatementType::Ddl,
            "BEGIN" | "COMMIT" | "END" | "ROLLBACK" | "SAVEPOINT" | "RELEASE" => {
                StatementType::Transaction
            }
            _ => StatementType::Other,
        }
    }

    /// Whether the statement is expected to produce a row stream
    pub fn returns_rows(self) -> bool {
        self == StatementType::Select
    }
}

/// Substitutes bound parameters into `?` placeholders for display.
///
/// Placeholders inside quoted literals, quoted identifiers and comments are
/// left alone. Placeholders without a matching parameter stay as `?`.
pub fn interpolate(sql: &str, params: &[Value]) -> String {
    let mut rendered = String::with_capacity(sql.len() + params.len() * 8);
    let mut params = params.iter();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                rendered.push(c);
                for inner in chars.by_ref() {
                    rendered.push(inner);
                    if inner == c {
                        break;
                    }
                }
            }
            '[' => {
                rendered.push(c);
                for inner in chars.by_ref() {
                    rendered.push(inner);
                    if inner == ']' {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                rendered.push(c);
                for inner in chars.by_ref() {
                    rendered.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                rendered.push(c);
                let mut previous = '\0';
                for inner in chars.by_ref() {
                    rendered.push(inner);
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            '?' => match params.next() {
                Some(value) => rendered.push_str(&value.to_sql_literal()),
                None => rendered.push('?'),
            },
            _ => rendered.push(c),
        }
    }

    rendered
}

/// Formats one statement log record: `(<seconds>) <query>`.
pub fn format_log_record(elapsed: Duration, query: &str) -> String {
    format!("({:.6}) {}", elapsed.as_secs_f64(), query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_type_classification() {
        assert_eq!(StatementType::from_sql("SELECT * FROM users"), StatementType::Select);
        assert_eq!(StatementType::from_sql("  with t as (select 1) select * from t"), StatementType::Select);
        assert_eq!(StatementType::from_sql("INSERT INTO users VALUES (1, 'test')"), StatementType::Insert);
        assert_eq!(StatementType::from_sql("replace into users values (1)"), StatementType::Insert);
        assert_eq!(StatementType::from_sql("UPDATE users SET name = 'new'"), StatementType::Update);
        assert_eq!(StatementType::from_sql("DELETE FROM users WHERE id = 1"), StatementType::Delete);
        assert_eq!(StatementType::from_sql("CREATE TABLE test (id INTEGER)"), StatementType::Ddl);
        assert_eq!(StatementType::from_sql("BEGIN TRANSACTION"), StatementType::Transaction);
        assert_eq!(StatementType::from_sql("VACUUM"), StatementType::Other);
        assert!(StatementType::from_sql("PRAGMA table_info(users)").returns_rows());
    }

    #[test]
    fn test_interpolate_positional() {
        let sql = "INSERT INTO users (name, age) VALUES (?, ?)";
        let rendered = interpolate(sql, &[Value::from("Blah"), Value::from(30)]);
        assert_eq!(rendered, "INSERT INTO users (name, age) VALUES ('Blah', 30)");
    }

    #[test]
    fn test_interpolate_skips_literals_and_comments() {
        let sql = "SELECT '?', \"a?\" FROM t -- why?\nWHERE x = ? /* ? */";
        let rendered = interpolate(sql, &[Value::Null]);
        assert_eq!(rendered, "SELECT '?', \"a?\" FROM t -- why?\nWHERE x = NULL /* ? */");
    }

    #[test]
    fn test_interpolate_missing_params() {
        assert_eq!(interpolate("SELECT ?, ?", &[Value::from(1)]), "SELECT 1, ?");
        assert_eq!(interpolate("SELECT * FROM users", &[]), "SELECT * FROM users");
    }

    #[test]
    fn test_log_record_format() {
        let record = format_log_record(Duration::from_micros(1234), "SELECT 1");
        assert_eq!(record, "(0.001234) SELECT 1");
    }
}
