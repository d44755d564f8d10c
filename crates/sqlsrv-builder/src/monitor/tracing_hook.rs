use super::truncate_sql_bytes;
use super::types::{HookAction, QueryContext, QueryHook, QueryResult};
use std::time::Duration;
use tracing::Level;

const SQL_TARGET: &str = "sqlsrv_builder.sql";

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// Logs every statement the builder sends to the connection.
///
/// The SQL (with `@Pn` placeholders, never the values) is emitted before
/// execution on target `sqlsrv_builder.sql`. Afterwards the outcome is
/// emitted at the same level; failures and statements slower than the
/// configured threshold are raised to WARN.
///
/// ```ignore
/// let hook = TracingSqlHook::new()
///     .with_level(tracing::Level::INFO)
///     .slow_threshold(Duration::from_millis(250));
/// let qb = Builder::new(&conn, "jobs").with_hook(hook);
/// ```
#[derive(Debug, Clone)]
pub struct TracingSqlHook {
    level: Level,
    /// Byte limit for logged SQL; `None` logs it whole.
    sql_limit: Option<usize>,
    slow_after: Option<Duration>,
}

impl Default for TracingSqlHook {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            sql_limit: Some(200),
            slow_after: None,
        }
    }
}

impl TracingSqlHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Cut logged SQL after `bytes` bytes (on a char boundary).
    pub fn truncate_at(mut self, bytes: usize) -> Self {
        self.sql_limit = Some(bytes);
        self
    }

    /// Log SQL in full.
    pub fn full_sql(mut self) -> Self {
        self.sql_limit = None;
        self
    }

    /// Warn about statements that take longer than `threshold`.
    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_after = Some(threshold);
        self
    }

    pub(crate) fn display_sql(&self, sql: &str) -> String {
        match self.sql_limit {
            Some(limit) if sql.len() > limit => format!("{}...", truncate_sql_bytes(sql, limit)),
            _ => sql.to_string(),
        }
    }

    pub(crate) fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_after.is_some_and(|t| elapsed > t)
    }
}

impl QueryHook for TracingSqlHook {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        let sql = self.display_sql(&ctx.exec_sql);
        emit_at_level!(
            self.level,
            target: SQL_TARGET,
            query_type = ?ctx.query_type,
            table = ctx.table.as_deref().unwrap_or("-"),
            params = ctx.param_count,
            sql = %sql,
        );
        HookAction::Continue
    }

    fn after_query(&self, ctx: &QueryContext, elapsed: Duration, result: &QueryResult) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match result {
            QueryResult::Error(message) => tracing::warn!(
                target: SQL_TARGET,
                query_type = ?ctx.query_type,
                elapsed_ms,
                error = %message,
                "statement failed"
            ),
            _ if self.is_slow(elapsed) => tracing::warn!(
                target: SQL_TARGET,
                query_type = ?ctx.query_type,
                elapsed_ms,
                result = %result,
                sql = %self.display_sql(&ctx.exec_sql),
                "slow statement"
            ),
            _ => emit_at_level!(
                self.level,
                target: SQL_TARGET,
                query_type = ?ctx.query_type,
                elapsed_ms,
                result = %result,
                "statement done"
            ),
        }
    }
}
