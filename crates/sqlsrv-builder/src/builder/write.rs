use super::{Builder, Outcome, SetItem, SetValue};
use crate::client::Connection;
use crate::condition::WhereClause;
use crate::error::{BuilderError, BuilderResult};
use crate::value::Value;

/// One row for `insert_batch` / `update_batch`: `(column, value)` pairs.
pub type BatchRow<'a> = Vec<(&'a str, Value)>;

/// Statements that take an ignore-duplicates modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IgnoreStatement {
    Insert,
}

impl<'c, C: Connection> Builder<'c, C> {
    /// Set a column for INSERT / UPDATE / REPLACE.
    ///
    /// Setting the same column twice keeps the last value. With `escape`
    /// off the value is embedded as raw SQL (`set("updated_at", "GETDATE()", Some(false))`).
    pub fn set(&mut self, column: &str, value: impl Into<Value>, escape: Option<bool>) -> &mut Self {
        let column = column.trim();
        if column.is_empty() {
            self.record_error("set() requires a column name");
            return self;
        }
        let escape = self.escape_or_default(escape);
        let value = value.into();
        let value = if escape {
            SetValue::Bound(self.bind(column, value))
        } else {
            SetValue::Raw(value.to_raw_sql())
        };
        let key_sql = self
            .protector()
            .protect_if(column, self.conn.config().protect_identifiers);

        match self.state.set.iter_mut().find(|s| s.column == column) {
            Some(existing) => existing.value = value,
            None => self.state.set.push(SetItem {
                column: column.to_string(),
                key_sql,
                value,
            }),
        }
        self
    }

    /// Set several columns at once, binding every value.
    pub fn set_many<I, K, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (column, value) in values {
            self.set(column.as_ref(), value, None);
        }
        self
    }

    /// Ask for duplicate rows to be skipped on INSERT.
    ///
    /// SQL Server has no `INSERT IGNORE`; the flag is accepted and compiles
    /// to nothing.
    pub fn ignore(&mut self, ignore: bool) -> &mut Self {
        self.state.ignore = ignore;
        self
    }

    fn compile_ignore(&self, _statement: IgnoreStatement) -> &'static str {
        ""
    }

    // ── compilation ──

    pub(crate) fn compile_insert(&self, table: &str) -> String {
        let full = self.full_name(table);
        let keys: Vec<&str> = self.state.set.iter().map(|s| s.key_sql.as_str()).collect();
        let values: Vec<String> = self.state.set.iter().map(SetItem::value_sql).collect();
        let statement = format!(
            "INSERT {}INTO {full} ({}) VALUES ({})",
            self.compile_ignore(IgnoreStatement::Insert),
            keys.join(","),
            values.join(", ")
        );
        self.wrap_identity(&full, statement)
    }

    fn compile_update(&self, table: &str, set: &[SetItem]) -> String {
        let full = self.full_name(table);
        let top = self
            .state
            .limit
            .map(|n| format!("TOP({n}) "))
            .unwrap_or_default();
        let assignments: Vec<String> = set
            .iter()
            .map(|s| format!("{} = {}", s.key_sql, s.value_sql()))
            .collect();
        let statement = format!(
            "UPDATE {top}{full} SET {}{}{}",
            assignments.join(", "),
            self.compile_where(),
            self.compile_order_by()
        );
        self.wrap_identity(&full, statement)
    }

    pub(crate) fn compile_delete(&self, table: &str) -> String {
        let top = self
            .state
            .limit
            .map(|n| format!("TOP ({n}) "))
            .unwrap_or_default();
        format!("DELETE {top}FROM {}{}", self.full_name(table), self.compile_where())
    }

    // ── terminals ──

    /// Run the INSERT built from `set` values. Returns the affected-row count.
    pub async fn insert(&mut self) -> BuilderResult<Outcome<u64>> {
        let table = match self.preflight("insert()") {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        if self.state.set.is_empty() {
            return self.fail("insert() requires at least one set() value");
        }
        let sql = self.compile_insert(&table);
        self.finish_write(sql).await
    }

    /// INSERT many rows, `batch_size` rows per statement.
    ///
    /// Every row must carry the same columns as the first. Values are
    /// inlined as escaped literals (or raw SQL with `escape` off).
    pub async fn insert_batch(
        &mut self,
        rows: &[BatchRow<'_>],
        escape: Option<bool>,
    ) -> BuilderResult<Outcome<u64>> {
        let table = match self.preflight("insert_batch()") {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        let Some(first) = rows.first() else {
            return self.fail("insert_batch() called with no rows");
        };
        let columns: Vec<&str> = first.iter().map(|(c, _)| c.trim()).collect();
        if columns.is_empty() {
            return self.fail("insert_batch() rows have no columns");
        }

        let escape = self.escape_or_default(escape);
        let mut tuples = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return self.fail(format!("insert_batch() row {i} does not match the first row's columns"));
            }
            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                let Some((_, value)) = row.iter().find(|(c, _)| c.trim() == *column) else {
                    return self.fail(format!("insert_batch() row {i} is missing column `{column}`"));
                };
                values.push(if escape { value.to_literal() } else { value.to_raw_sql() });
            }
            tuples.push(format!("({})", values.join(", ")));
        }

        let protector = self.protector();
        let keys: Vec<String> = columns
            .iter()
            .map(|c| protector.protect_if(c, self.conn.config().protect_identifiers))
            .collect();
        let full = self.full_name(&table);
        let statements: Vec<String> = tuples
            .chunks(self.options.batch_size.max(1))
            .map(|chunk| {
                let statement = format!(
                    "INSERT {}INTO {full} ({}) VALUES {}",
                    self.compile_ignore(IgnoreStatement::Insert),
                    keys.join(","),
                    chunk.join(", ")
                );
                self.wrap_identity(&full, statement)
            })
            .collect();

        self.finish_statements(statements).await
    }

    /// Run the UPDATE built from `set` values and the current WHERE.
    pub async fn update(&mut self) -> BuilderResult<Outcome<u64>> {
        let table = match self.preflight("update()") {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        if self.state.set.is_empty() {
            return self.fail("update() requires at least one set() value");
        }
        let sql = self.compile_update(&table, &self.state.set);
        self.finish_write(sql).await
    }

    /// UPDATE many rows keyed by `index` with one `CASE` per column.
    ///
    /// ```text
    /// UPDATE t SET "name" = CASE WHEN "id" = 1 THEN 'a' WHEN "id" = 2 THEN 'b' ELSE "name" END
    /// WHERE "id" IN(1,2)
    /// ```
    ///
    /// Every row must carry `index`. All rows go into one statement unless
    /// `update_batch_size` is set; the current WHERE then applies to every
    /// chunk.
    pub async fn update_batch(
        &mut self,
        rows: &[BatchRow<'_>],
        index: &str,
    ) -> BuilderResult<Outcome<u64>> {
        let table = match self.preflight("update_batch()") {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        let index = index.trim();
        if index.is_empty() {
            return self.fail("update_batch() requires an index column");
        }
        if rows.is_empty() {
            return self.fail("update_batch() called with no rows");
        }
        for (i, row) in rows.iter().enumerate() {
            if !row.iter().any(|(c, _)| c.trim() == index) {
                return self.fail(format!("update_batch() row {i} is missing index column `{index}`"));
            }
        }
        let rows: Vec<&BatchRow<'_>> = rows
            .iter()
            .filter(|row| row.iter().any(|(c, _)| c.trim() != index))
            .collect();
        if rows.is_empty() {
            return self.fail("update_batch() rows have no columns besides the index");
        }

        let chunk_size = self.options.update_batch_size.unwrap_or(rows.len()).max(1);
        let user_where = self.state.where_.clone();
        let mut statements = Vec::new();
        for chunk in rows.chunks(chunk_size) {
            statements.push(self.compile_update_batch_chunk(&table, chunk, index));
            self.state.where_ = user_where.clone();
        }

        self.finish_statements(statements).await
    }

    fn compile_update_batch_chunk(&mut self, table: &str, chunk: &[&BatchRow<'_>], index: &str) -> String {
        let protector = self.protector();
        let index_sql = protector.protect(index);

        let mut columns: Vec<&str> = Vec::new();
        let mut ids = Vec::with_capacity(chunk.len());
        for row in chunk {
            for (column, _) in row.iter() {
                let column = column.trim();
                if column != index && !columns.contains(&column) {
                    columns.push(column);
                }
            }
            if let Some((_, id)) = row.iter().find(|(c, _)| c.trim() == index) {
                ids.push(id.to_literal());
            }
        }

        let cases: Vec<String> = columns
            .iter()
            .map(|column| {
                let column_sql = protector.protect(column);
                let whens: Vec<String> = chunk
                    .iter()
                    .filter_map(|row| {
                        let id = row.iter().find(|(c, _)| c.trim() == index)?;
                        let value = row.iter().find(|(c, _)| c.trim() == *column)?;
                        Some(format!(
                            "WHEN {index_sql} = {} THEN {}",
                            id.1.to_literal(),
                            value.1.to_literal()
                        ))
                    })
                    .collect();
                format!("{column_sql} = CASE {} ELSE {column_sql} END", whens.join(" "))
            })
            .collect();

        let full = self.full_name(table);
        let prefix = if self.state.where_.is_empty() { "" } else { "AND " };
        self.state.where_.push(WhereClause::raw(
            prefix,
            format!("{index_sql} IN({})", ids.join(",")),
        ));
        format!("UPDATE {full} SET {}{}", cases.join(", "), self.compile_where())
    }

    /// DELETE rows matching the current WHERE (plus `condition`, if given).
    ///
    /// A DELETE without any WHERE entry is refused; use [`empty_table`](Self::empty_table)
    /// or [`truncate`](Self::truncate) to clear a table.
    pub async fn delete(
        &mut self,
        condition: Option<&str>,
        limit: Option<u64>,
        reset_data: bool,
    ) -> BuilderResult<Outcome<u64>> {
        let table = match self.preflight("delete()") {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        if let Some(condition) = condition {
            self.where_raw(condition, None);
        }
        if !self.has_where_predicate() {
            return self.fail("delete() requires a WHERE clause");
        }
        if let Some(limit) = limit {
            self.limit(limit);
        }

        let sql = self.compile_delete(&table);
        if self.test_mode {
            let compiled = self.inline(&sql);
            if reset_data {
                self.reset_write();
            }
            return Ok(Outcome::Compiled(compiled));
        }
        let result = self.execute(&sql).await;
        if reset_data {
            self.reset_write();
        }
        Ok(Outcome::Executed(result?.affected_rows))
    }

    /// `TRUNCATE TABLE <table>`
    pub async fn truncate(&mut self) -> BuilderResult<Outcome<u64>> {
        let table = match self.preflight("truncate()") {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        let sql = format!("TRUNCATE TABLE {}", self.full_name(&table));
        self.finish_write(sql).await
    }

    /// `DELETE FROM <table>`, every row.
    pub async fn empty_table(&mut self) -> BuilderResult<Outcome<u64>> {
        let table = match self.preflight("empty_table()") {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        let sql = format!("DELETE FROM {}", self.full_name(&table));
        self.finish_write(sql).await
    }

    /// `column = column + value` for rows matching the current WHERE.
    pub async fn increment(&mut self, column: &str, value: i64) -> BuilderResult<Outcome<bool>> {
        self.step(column, value, '+', "increment()").await
    }

    /// `column = column - value` for rows matching the current WHERE.
    pub async fn decrement(&mut self, column: &str, value: i64) -> BuilderResult<Outcome<bool>> {
        self.step(column, value, '-', "decrement()").await
    }

    async fn step(
        &mut self,
        column: &str,
        value: i64,
        sign: char,
        operation: &str,
    ) -> BuilderResult<Outcome<bool>> {
        let table = match self.preflight(operation) {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        let column = column.trim();
        if column.is_empty() {
            return self.fail(format!("{operation} requires a column name"));
        }

        let column_sql = self.protector().protect(column);
        // Numeric text columns are converted through INT and back.
        let expr = if self.options.cast_text_to_int {
            format!(
                "CONVERT(VARCHAR(MAX),CONVERT(INT,CONVERT(VARCHAR(MAX), {column_sql})) {sign} {value})"
            )
        } else {
            format!("{column_sql} {sign} {value}")
        };
        let set = [SetItem {
            column: column.to_string(),
            key_sql: column_sql,
            value: SetValue::Raw(expr),
        }];
        let sql = self.compile_update(&table, &set);

        Ok(match self.finish_write(sql).await? {
            Outcome::Executed(_) => Outcome::Executed(true),
            Outcome::Compiled(sql) => Outcome::Compiled(sql),
            Outcome::Skipped => Outcome::Skipped,
        })
    }

    /// The INSERT that `insert` would run, with literals inlined.
    pub fn get_compiled_insert(&mut self, reset: bool) -> BuilderResult<String> {
        let table = self.preflight("get_compiled_insert()").map_err(BuilderError::Usage)?;
        if self.state.set.is_empty() {
            return Err(BuilderError::usage("get_compiled_insert() requires at least one set() value"));
        }
        let sql = self.inline(&self.compile_insert(&table));
        if reset {
            self.reset_write();
        }
        Ok(sql)
    }

    /// The UPDATE that `update` would run, with literals inlined.
    pub fn get_compiled_update(&mut self, reset: bool) -> BuilderResult<String> {
        let table = self.preflight("get_compiled_update()").map_err(BuilderError::Usage)?;
        if self.state.set.is_empty() {
            return Err(BuilderError::usage("get_compiled_update() requires at least one set() value"));
        }
        let sql = self.inline(&self.compile_update(&table, &self.state.set));
        if reset {
            self.reset_write();
        }
        Ok(sql)
    }

    /// The DELETE that `delete` would run, with literals inlined.
    pub fn get_compiled_delete(&mut self, reset: bool) -> BuilderResult<String> {
        let table = self.preflight("get_compiled_delete()").map_err(BuilderError::Usage)?;
        if !self.has_where_predicate() {
            return Err(BuilderError::usage("get_compiled_delete() requires a WHERE clause"));
        }
        let sql = self.inline(&self.compile_delete(&table));
        if reset {
            self.reset_write();
        }
        Ok(sql)
    }

    /// Compile-only or execute one write statement, then reset write state.
    async fn finish_write(&mut self, sql: String) -> BuilderResult<Outcome<u64>> {
        if self.test_mode {
            let compiled = self.inline(&sql);
            self.reset_write();
            return Ok(Outcome::Compiled(compiled));
        }
        let result = self.execute(&sql).await;
        self.reset_write();
        Ok(Outcome::Executed(result?.affected_rows))
    }

    /// Like [`finish_write`](Self::finish_write) for several statements,
    /// summing affected rows. Execution stops at the first failure.
    async fn finish_statements(&mut self, statements: Vec<String>) -> BuilderResult<Outcome<u64>> {
        if self.test_mode {
            let compiled = statements
                .iter()
                .map(|sql| self.inline(sql))
                .collect::<Vec<_>>()
                .join("\n");
            self.reset_write();
            return Ok(Outcome::Compiled(compiled));
        }

        // Every chunk shares the caller's WHERE binds, so they are cleared
        // only once all statements ran.
        let mut affected = 0;
        let mut failure = None;
        for sql in &statements {
            let statement = self.binds.to_statement(sql);
            match self.dispatch(statement, false).await {
                Ok(rs) => affected += rs.affected_rows,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.binds.clear();
        self.reset_write();
        match failure {
            Some(e) => Err(e),
            None => Ok(Outcome::Executed(affected)),
        }
    }
}
