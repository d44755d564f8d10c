//! The SQL Server statement builder.
//!
//! [`Builder`] accumulates query state through chainable `&mut self`
//! methods and compiles it when a terminal method (`get`, `insert`,
//! `update`, `delete`, `replace`, ...) is awaited.
//!
//! ## Design
//!
//! - Values are bound as `:name:` markers while the statement is built, then
//!   rendered as `@P1, @P2, ...` parameters for the connection or inlined as
//!   literals in compile-only mode.
//! - Safe defaults: DELETE requires WHERE; INSERT, UPDATE and REPLACE require SET.
//! - Usage errors are returned as `Err` in strict mode (the default). In
//!   permissive mode the terminal call logs a warning and returns
//!   [`Outcome::Skipped`].
//!
//! ```ignore
//! let mut qb = Builder::new(&conn, "jobs");
//! qb.select("id, name", None)
//!     .where_("status", "open", None)
//!     .order_by("created_at", "DESC", None);
//! let rows = qb.get(Some(10), Some(20), true).await?;
//! ```

mod join;
mod replace;
mod select;
mod where_builder;
mod write;

#[cfg(test)]
mod tests;

pub use where_builder::LikeSide;
pub use write::BatchRow;

use crate::binds::{Binds, Statement};
use crate::client::{Connection, ResultSet};
use crate::condition::WhereClause;
use crate::config::BuilderOptions;
use crate::error::{BuilderError, BuilderResult};
use crate::ident::{Protector, table_alias};
use crate::monitor::{HookAction, QueryContext, QueryHook, QueryResult, QueryType};
use crate::value::Value;
use std::sync::Arc;
use std::time::Instant;

/// What a terminal operation did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The statement ran against the connection.
    Executed(T),
    /// Compile-only mode: the SQL with literals inlined.
    Compiled(String),
    /// Permissive mode: the statement could not be built and was not run.
    Skipped,
}

impl<T> Outcome<T> {
    /// The executed result, if the statement ran.
    pub fn executed(self) -> Option<T> {
        match self {
            Outcome::Executed(v) => Some(v),
            _ => None,
        }
    }

    /// The compiled SQL, in compile-only mode.
    pub fn compiled(&self) -> Option<&str> {
        match self {
            Outcome::Compiled(sql) => Some(sql),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectItem {
    pub(crate) expr: String,
    pub(crate) escape: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupItem {
    pub(crate) field: String,
    pub(crate) escape: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrderItem {
    pub(crate) field: String,
    /// `""`, `" ASC"` or `" DESC"`
    pub(crate) direction: String,
    pub(crate) escape: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SetValue {
    /// Name of a registered bind.
    Bound(String),
    /// SQL text emitted as-is.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SetItem {
    /// Column as given by the caller.
    pub(crate) column: String,
    /// Column as it appears in the statement.
    pub(crate) key_sql: String,
    pub(crate) value: SetValue,
}

impl SetItem {
    fn value_sql(&self) -> String {
        match &self.value {
            SetValue::Bound(name) => format!(":{name}:"),
            SetValue::Raw(sql) => sql.clone(),
        }
    }
}

/// Everything a statement is compiled from.
#[derive(Debug, Clone, Default)]
pub(crate) struct QueryState {
    pub(crate) select: Vec<SelectItem>,
    pub(crate) from: Vec<String>,
    pub(crate) joins: Vec<String>,
    pub(crate) where_: Vec<WhereClause>,
    pub(crate) having: Vec<WhereClause>,
    pub(crate) group_by: Vec<GroupItem>,
    pub(crate) order_by: Vec<OrderItem>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) distinct: bool,
    pub(crate) set: Vec<SetItem>,
    pub(crate) aliased_tables: Vec<String>,
    pub(crate) where_group_started: bool,
    pub(crate) where_group_depth: usize,
    pub(crate) ignore: bool,
}

/// SQL Server statement builder bound to one connection.
pub struct Builder<'c, C: Connection> {
    conn: &'c C,
    options: BuilderOptions,
    state: QueryState,
    binds: Binds,
    test_mode: bool,
    hook: Option<Arc<dyn QueryHook>>,
    /// First usage error recorded by a chained call (strict mode).
    build_error: Option<String>,
}

impl<C: Connection> Clone for Builder<'_, C> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn,
            options: self.options.clone(),
            state: self.state.clone(),
            binds: self.binds.clone(),
            test_mode: self.test_mode,
            hook: self.hook.clone(),
            build_error: self.build_error.clone(),
        }
    }
}

impl<C: Connection> std::fmt::Debug for Builder<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("binds", &self.binds)
            .field("test_mode", &self.test_mode)
            .field("has_hook", &self.hook.is_some())
            .field("build_error", &self.build_error)
            .finish()
    }
}

impl<'c, C: Connection> Builder<'c, C> {
    /// Create a builder for `table` (may be empty and set later with `from`).
    pub fn new(conn: &'c C, table: &str) -> Self {
        let mut builder = Self {
            conn,
            options: BuilderOptions::default(),
            state: QueryState::default(),
            binds: Binds::new(),
            test_mode: false,
            hook: None,
            build_error: None,
        };
        if !table.trim().is_empty() {
            builder.from(table);
        }
        builder
    }

    /// Replace the builder options.
    pub fn with_options(mut self, options: BuilderOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a query hook.
    pub fn with_hook<H: QueryHook + 'static>(mut self, hook: H) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Attach an Arc-wrapped query hook.
    pub fn with_hook_arc(mut self, hook: Arc<dyn QueryHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Compile-only mode: terminal methods return SQL instead of executing it.
    pub fn test_mode(&mut self, enabled: bool) -> &mut Self {
        self.test_mode = enabled;
        self
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Binds registered for the current statement.
    pub fn binds(&self) -> &Binds {
        &self.binds
    }

    /// The first FROM table, as given.
    pub fn table(&self) -> Option<&str> {
        self.state.from.first().map(String::as_str)
    }

    /// A builder on the same connection, options and hook with empty state
    /// and no binds. Used for sub-selects.
    pub fn clean_clone(&self) -> Self {
        Self {
            conn: self.conn,
            options: self.options.clone(),
            state: QueryState::default(),
            binds: Binds::new(),
            test_mode: self.test_mode,
            hook: self.hook.clone(),
            build_error: None,
        }
    }

    /// Clear select-scoped state. FROM is kept.
    pub fn reset_select(&mut self) -> &mut Self {
        let from = std::mem::take(&mut self.state.from);
        let set = std::mem::take(&mut self.state.set);
        let ignore = self.state.ignore;
        self.state = QueryState {
            from,
            set,
            ignore,
            ..QueryState::default()
        };
        self.retrack_aliases();
        self
    }

    /// Clear write-scoped state. FROM is kept.
    pub fn reset_write(&mut self) -> &mut Self {
        let s = &mut self.state;
        s.set.clear();
        s.joins.clear();
        s.where_.clear();
        s.order_by.clear();
        s.limit = None;
        s.ignore = false;
        s.where_group_started = false;
        s.where_group_depth = 0;
        self
    }

    fn retrack_aliases(&mut self) {
        self.state.aliased_tables = self
            .state
            .from
            .iter()
            .filter_map(|t| table_alias(t))
            .collect();
    }

    pub(crate) fn track_alias(&mut self, table: &str) {
        if let Some(alias) = table_alias(table)
            && !self.state.aliased_tables.contains(&alias)
        {
            self.state.aliased_tables.push(alias);
        }
    }

    pub(crate) fn protector(&self) -> Protector<'_> {
        Protector::new(self.conn.config(), &self.state.aliased_tables)
    }

    /// `escape`, or the connection's protect-identifiers default.
    pub(crate) fn escape_or_default(&self, escape: Option<bool>) -> bool {
        escape.unwrap_or(self.conn.config().protect_identifiers)
    }

    /// Record a usage error found while chaining.
    ///
    /// Strict mode keeps the first one for the next terminal call;
    /// permissive mode drops the offending call with a warning.
    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.options.strict {
            if self.build_error.is_none() {
                self.build_error = Some(message);
            }
        } else {
            tracing::warn!(target: "sqlsrv_builder", table = self.table().unwrap_or("-"), "{message}; call ignored");
        }
    }

    /// Turn a usage failure into an error or a skip, depending on strictness.
    pub(crate) fn fail<T>(&self, message: impl Into<String>) -> BuilderResult<Outcome<T>> {
        let message = message.into();
        if self.options.strict {
            Err(BuilderError::Usage(message))
        } else {
            tracing::warn!(target: "sqlsrv_builder", table = self.table().unwrap_or("-"), "{message}; statement skipped");
            Ok(Outcome::Skipped)
        }
    }

    /// Surface a recorded build error or an unclosed where group.
    pub(crate) fn check_pending(&mut self, operation: &str) -> Result<(), String> {
        if let Some(message) = self.build_error.take() {
            return Err(message);
        }
        if self.state.where_group_depth > 0 {
            return Err(format!(
                "{operation}: where group opened with group_start() was never closed"
            ));
        }
        Ok(())
    }

    /// Checks shared by every terminal method. Returns the first FROM table.
    pub(crate) fn preflight(&mut self, operation: &str) -> Result<String, String> {
        self.check_pending(operation)?;
        match self.state.from.first() {
            Some(table) => Ok(table.clone()),
            None => Err(format!("{operation} requires a table")),
        }
    }

    /// Fully qualified name of `table` without its alias.
    pub(crate) fn full_name(&self, table: &str) -> String {
        self.protector().full_name(table, false)
    }

    /// Bare table name (no alias) of a FROM reference.
    pub(crate) fn bare_table(table: &str) -> &str {
        table.split_whitespace().next().unwrap_or(table)
    }

    /// Wrap `statement` in `SET IDENTITY_INSERT` toggles when enabled.
    pub(crate) fn wrap_identity(&self, full_table: &str, statement: String) -> String {
        if self.options.identity_insert {
            format!(
                "SET IDENTITY_INSERT {full_table} ON\n{statement}\nSET IDENTITY_INSERT {full_table} OFF"
            )
        } else {
            statement
        }
    }

    /// Compiled SQL with bind markers replaced by literals.
    pub(crate) fn inline(&self, sql: &str) -> String {
        self.binds.inline(sql)
    }

    /// Execute `sql` with the current binds, then clear them.
    pub(crate) async fn execute(&mut self, sql: &str) -> BuilderResult<ResultSet> {
        let statement = self.binds.to_statement(sql);
        let result = self.dispatch(statement, false).await;
        self.binds.clear();
        result
    }

    /// Send a statement without binds through the collaborator's simple-query call.
    pub(crate) async fn execute_simple(&self, sql: &str) -> BuilderResult<()> {
        let statement = Statement {
            sql: sql.to_string(),
            params: Vec::new(),
        };
        self.dispatch(statement, true).await.map(|_| ())
    }

    async fn dispatch(&self, statement: Statement, simple: bool) -> BuilderResult<ResultSet> {
        let mut ctx = QueryContext::new(&statement.sql, statement.params.len());
        if let Some(table) = self.table() {
            ctx = ctx.with_table(Self::bare_table(table));
        }

        if let Some(hook) = &self.hook {
            match hook.before_query(&ctx) {
                HookAction::Continue => {}
                HookAction::ModifySql(sql) => {
                    ctx.query_type = QueryType::from_sql(&sql);
                    ctx.exec_sql = sql;
                }
                HookAction::Abort(reason) => return Err(BuilderError::Aborted(reason)),
            }
        }

        let start = Instant::now();
        let result = if simple {
            self.conn
                .simple_query(&ctx.exec_sql)
                .await
                .map(|()| ResultSet::default())
        } else {
            self.conn.query(&ctx.exec_sql, &statement.params).await
        };

        if let Some(hook) = &self.hook {
            let outcome = match &result {
                Ok(rs) if rs.rows.is_empty() => QueryResult::Affected(rs.affected_rows),
                Ok(rs) => QueryResult::Rows(rs.rows.len()),
                Err(e) => QueryResult::error(e.to_string()),
            };
            hook.after_query(&ctx, start.elapsed(), &outcome);
        }
        result
    }

    /// Bind `value` under a name derived from `key`.
    pub(crate) fn bind(&mut self, key: &str, value: Value) -> String {
        self.binds.bind(key, value)
    }
}
