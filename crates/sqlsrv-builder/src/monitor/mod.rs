//! Statement hooks and SQL logging.
//!
//! A builder can carry one [`QueryHook`]; it sees every statement right
//! before it is sent to the [`Connection`](crate::Connection) and the outcome
//! afterwards. Compile-only mode never reaches the hook.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlsrv_builder::monitor::{CompositeHook, HookAction, QueryContext, QueryHook, TracingSqlHook};
//!
//! struct NoTruncate;
//!
//! impl QueryHook for NoTruncate {
//!     fn before_query(&self, ctx: &QueryContext) -> HookAction {
//!         if ctx.exec_sql.starts_with("TRUNCATE") {
//!             HookAction::Abort("TRUNCATE is disabled".into())
//!         } else {
//!             HookAction::Continue
//!         }
//!     }
//! }
//!
//! let hook = CompositeHook::new().add(NoTruncate).add(TracingSqlHook::new());
//! let mut qb = Builder::new(&conn, "jobs").with_hook(hook);
//! ```

mod tracing_hook;
mod types;


use std::sync::Arc;
use std::time::Duration;

pub use tracing_hook::TracingSqlHook;
pub use types::{HookAction, QueryContext, QueryHook, QueryResult, QueryType};

/// Runs several hooks in order.
///
/// SQL rewritten by one hook is what the next hook sees; the first `Abort`
/// wins.
#[derive(Clone, Default)]
pub struct CompositeHook {
    hooks: Vec<Arc<dyn QueryHook>>,
}

impl CompositeHook {
    /// Create an empty composite hook.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Add a hook.
    #[allow(clippy::should_implement_trait)]
    pub fn add<H: QueryHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Add an Arc-wrapped hook.
    pub fn add_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hooks.push(hook);
        self
    }
}

impl QueryHook for CompositeHook {
    fn before_query(&self, ctx: &QueryContext) -> HookAction {
        let mut current = ctx.clone();
        for hook in &self.hooks {
            match hook.before_query(&current) {
                HookAction::Continue => {}
                HookAction::ModifySql(sql) => {
                    current.query_type = QueryType::from_sql(&sql);
                    current.exec_sql = sql;
                }
                action @ HookAction::Abort(_) => return action,
            }
        }
        if current.exec_sql != ctx.exec_sql {
            HookAction::ModifySql(current.exec_sql)
        } else {
            HookAction::Continue
        }
    }

    fn after_query(&self, ctx: &QueryContext, duration: Duration, result: &QueryResult) {
        for hook in &self.hooks {
            hook.after_query(ctx, duration, result);
        }
    }
}

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
