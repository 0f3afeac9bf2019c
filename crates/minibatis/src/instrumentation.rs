//! Tracing instrumentation for statement execution.
//!
//! Sessions open one span per executed statement and one per transaction
//! boundary. Field names follow the OpenTelemetry database semantic
//! conventions so a `tracing-opentelemetry` layer can export them as-is:
//!
//! - `db.system`: "minibatis"
//! - `db.statement`: positional SQL (sanitized)
//! - `db.operation`: statement kind (SELECT, INSERT, etc.)
//! - `db.rows_affected`: recorded after execution
//! - `minibatis.mapping_id`: fully-qualified mapping id
//!
//! ```rust,ignore
//! let span = statement_span("app.dao.UserDao.update", bound.sql());
//! let rows = conn.execute(bound.sql(), bound.params()).instrument(span.clone()).await?;
//! record_rows(&span, rows);
//! ```

use tracing::Span;
use tracing::field::Empty;

/// Value of the `db.system` attribute.
pub const DB_SYSTEM: &str = "minibatis";

/// Span names for database operations.
pub mod span_names {
    /// Span name for statement execution.
    pub const STATEMENT: &str = "minibatis.statement";
    /// Span name for committing a transaction.
    pub const COMMIT: &str = "minibatis.commit";
    /// Span name for rolling back a transaction.
    pub const ROLLBACK: &str = "minibatis.rollback";
}

/// Attribute keys following OpenTelemetry semantic conventions.
pub mod attributes {
    /// Database system type.
    pub const DB_SYSTEM: &str = "db.system";
    /// SQL statement (may be sanitized).
    pub const DB_STATEMENT: &str = "db.statement";
    /// Database operation type.
    pub const DB_OPERATION: &str = "db.operation";
    /// Number of rows affected or returned.
    pub const DB_ROWS_AFFECTED: &str = "db.rows_affected";
    /// Mapping id the statement was registered under.
    pub const MAPPING_ID: &str = "minibatis.mapping_id";
    /// Failure category.
    pub const ERROR_KIND: &str = "error.kind";
}

/// Configuration for SQL statement sanitization.
#[derive(Debug, Clone)]
pub struct SanitizationConfig {
    /// Whether to sanitize SQL statements.
    pub enabled: bool,
    /// Maximum length of statement to record.
    pub max_length: usize,
    /// Placeholder to use for sanitized values.
    pub placeholder: String,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_length: 2048,
            placeholder: "?".to_string(),
        }
    }
}

impl SanitizationConfig {
    /// Create a configuration that doesn't sanitize statements.
    #[must_use]
    pub fn no_sanitization() -> Self {
        Self {
            enabled: false,
            max_length: usize::MAX,
            placeholder: String::new(),
        }
    }

    /// Sanitize a SQL statement according to the configuration.
    #[must_use]
    pub fn sanitize(&self, sql: &str) -> String {
        if !self.enabled {
            return truncate_string(sql, self.max_length);
        }
        let sanitized = replace_literals(sql, &self.placeholder);
        truncate_string(&sanitized, self.max_length)
    }
}

/// Sanitize SQL with the default configuration.
///
/// String and numeric literals become `?`; the result is capped at 2048
/// bytes.
#[must_use]
pub fn sanitize_sql(sql: &str) -> String {
    SanitizationConfig::default().sanitize(sql)
}

fn replace_literals(sql: &str, placeholder: &str) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                // Doubled quote is an escaped quote
                if chars.peek() == Some(&q) {
                    chars.next();
                    continue;
                }
                quote = None;
                result.push_str(placeholder);
            }
            continue;
        }

        if c == '\'' {
            quote = Some(c);
            continue;
        }

        if c.is_ascii_digit() && !result.ends_with(|ch: char| ch.is_alphanumeric() || ch == '_') {
            while chars
                .peek()
                .is_some_and(|ch| ch.is_ascii_digit() || *ch == '.')
            {
                chars.next();
            }
            result.push_str(placeholder);
            continue;
        }

        result.push(c);
    }

    if quote.is_some() {
        result.push_str(placeholder);
    }
    result
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Extract the operation type from a SQL statement.
#[must_use]
pub fn extract_operation(sql: &str) -> &'static str {
    let keyword = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    match keyword.as_str() {
        "SELECT" | "WITH" => "SELECT",
        "INSERT" => "INSERT",
        "UPDATE" => "UPDATE",
        "DELETE" => "DELETE",
        "MERGE" => "MERGE",
        "CALL" | "EXEC" | "EXECUTE" => "CALL",
        "CREATE" => "CREATE",
        "ALTER" => "ALTER",
        "DROP" => "DROP",
        _ => "OTHER",
    }
}

/// Span for one mapped statement. `db.rows_affected` and `error.kind` start
/// empty; fill them with [`record_rows`] and [`record_error`].
#[must_use]
pub fn statement_span(mapping_id: &str, sql: &str) -> Span {
    tracing::debug_span!(
        span_names::STATEMENT,
        db.system = DB_SYSTEM,
        db.operation = extract_operation(sql),
        db.statement = %sanitize_sql(sql),
        minibatis.mapping_id = mapping_id,
        db.rows_affected = Empty,
        error.kind = Empty,
    )
}

/// Span for a commit or rollback.
#[must_use]
pub fn transaction_span(commit: bool) -> Span {
    if commit {
        tracing::debug_span!(span_names::COMMIT, db.system = DB_SYSTEM, error.kind = Empty)
    } else {
        tracing::debug_span!(span_names::ROLLBACK, db.system = DB_SYSTEM, error.kind = Empty)
    }
}

/// Record the affected or returned row count on a statement span.
pub fn record_rows(span: &Span, rows: u64) {
    span.record(attributes::DB_ROWS_AFFECTED, rows);
}

/// Record a failure on a span.
pub fn record_error(span: &Span, error: &crate::error::Error) {
    let kind = match error {
        crate::error::Error::Driver(_) => "driver",
        crate::error::Error::Pool(_) => "pool",
        crate::error::Error::Type(_) => "type",
        crate::error::Error::Binding { .. } => "binding",
        _ => "session",
    };
    span.record(attributes::ERROR_KIND, kind);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_operation() {
        assert_eq!(extract_operation("SELECT * FROM t_user"), "SELECT");
        assert_eq!(extract_operation("  select id from t_user"), "SELECT");
        assert_eq!(extract_operation("with x as (select 1) select * from x"), "SELECT");
        assert_eq!(extract_operation("insert into t_user values (?)"), "INSERT");
        assert_eq!(extract_operation("UPDATE t_user SET name = ?"), "UPDATE");
        assert_eq!(extract_operation("delete from t_user"), "DELETE");
        assert_eq!(extract_operation("call refresh()"), "CALL");
        assert_eq!(extract_operation("unknown stuff"), "OTHER");
        assert_eq!(extract_operation(""), "OTHER");
    }

    #[test]
    fn test_sanitize_sql() {
        assert_eq!(
            sanitize_sql("select * from t_user where name = 'Alice'"),
            "select * from t_user where name = ?"
        );
        assert_eq!(
            sanitize_sql("insert into t values ('a', 'b')"),
            "insert into t values (?, ?)"
        );
        assert_eq!(
            sanitize_sql("select * from t where name = 'O''Brien'"),
            "select * from t where name = ?"
        );
        assert_eq!(
            sanitize_sql("select * from t where id = 42 and t2.x = ?"),
            "select * from t where id = ? and t2.x = ?"
        );
    }

    #[test]
    fn test_no_sanitization_keeps_literals() {
        let config = SanitizationConfig::no_sanitization();
        assert_eq!(config.sanitize("select 'x'"), "select 'x'");
    }

    #[test]
    fn test_truncation() {
        let config = SanitizationConfig {
            enabled: false,
            max_length: 10,
            placeholder: "?".into(),
        };
        assert_eq!(config.sanitize("select * from t_user"), "select ...");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let config = SanitizationConfig {
            enabled: false,
            max_length: 6,
            placeholder: "?".into(),
        };
        assert_eq!(config.sanitize("ab€€€€"), "ab...");
    }
}
