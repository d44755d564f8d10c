use std::fmt;
use std::time::Duration;

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// SELECT query
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// Other SQL (TRUNCATE, SET IDENTITY_INSERT, ...)
    Other,
}

impl QueryType {
    /// Detect query type from SQL string.
    ///
    /// Leading `SET IDENTITY_INSERT ... ON` lines are skipped so wrapped
    /// writes are classified by the statement they wrap.
    pub fn from_sql(sql: &str) -> Self {
        let mut rest = sql.trim_start();
        while starts_with_keyword(rest, "SET") {
            match rest.find('\n') {
                Some(pos) => rest = rest[pos + 1..].trim_start(),
                None => return QueryType::Other,
            }
        }

        if starts_with_keyword(rest, "SELECT") {
            QueryType::Select
        } else if starts_with_keyword(rest, "INSERT") {
            QueryType::Insert
        } else if starts_with_keyword(rest, "UPDATE") {
            QueryType::Update
        } else if starts_with_keyword(rest, "DELETE") {
            QueryType::Delete
        } else {
            QueryType::Other
        }
    }
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
        && sql[keyword.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_')
}

/// Context information about the statement being executed.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// The SQL sent to the connection, with `@Pn` placeholders.
    pub exec_sql: String,
    /// Number of parameters.
    pub param_count: usize,
    /// Detected query type.
    pub query_type: QueryType,
    /// Table the builder was created for, if any.
    pub table: Option<String>,
}

impl QueryContext {
    /// Create a new query context.
    pub fn new(sql: &str, param_count: usize) -> Self {
        Self {
            exec_sql: sql.to_string(),
            param_count,
            query_type: QueryType::from_sql(sql),
            table: None,
        }
    }

    /// Record the table the statement targets.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// Maximum length for error messages in `QueryResult::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Result of a statement execution for monitoring purposes.
#[derive(Debug, Clone)]
pub enum QueryResult {
    /// Statement returned rows.
    Rows(usize),
    /// Statement affected rows.
    Affected(u64),
    /// Statement failed (message truncated to 512 bytes).
    Error(String),
}

impl QueryResult {
    /// Create an error result, truncating long messages.
    pub fn error(msg: String) -> Self {
        if msg.len() > MAX_ERROR_LEN {
            Self::Error(format!("{}...", super::truncate_sql_bytes(&msg, MAX_ERROR_LEN)))
        } else {
            Self::Error(msg)
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Action to take after a hook processes a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Continue with the original statement.
    Continue,
    /// Continue with different SQL text (parameters are unchanged).
    ModifySql(String),
    /// Refuse the statement; the terminal call fails with `BuilderError::Aborted`.
    Abort(String),
}

/// Trait for hooking into statement execution.
///
/// Hooks can inspect, modify, or abort statements before they are sent to
/// the connection, and observe the outcome afterwards.
pub trait QueryHook: Send + Sync {
    /// Called before a statement is executed.
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        let _ = ctx;
        HookAction::Continue
    }

    /// Called after a statement completes (success or failure).
    fn after_query(&self, _ctx: &QueryContext, _duration: Duration, _result: &QueryResult) {}
}
