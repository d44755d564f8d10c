//! REPLACE emulation.
//!
//! SQL Server has no `REPLACE INTO`. The builder looks up the table's
//! PRIMARY and UNIQUE keys, finds the SET columns that belong to them,
//! deletes any row matching those values and inserts the new one. The three
//! round trips are not wrapped in a transaction; callers that need atomicity
//! run the builder on a transaction connection.

use super::{Builder, Outcome, SetValue};
use crate::client::Connection;
use crate::error::BuilderResult;
use crate::ident::unqualified;
use crate::value::Value;

/// A key column and the value the new row gives it.
enum KeyMatch {
    Bound(String, Value),
    Raw(String, String),
}

impl<'c, C: Connection> Builder<'c, C> {
    /// Insert a row, first deleting any row that shares a PRIMARY or UNIQUE
    /// key value with it.
    ///
    /// `values` are merged into the current `set` state. In compile-only mode
    /// the result is the DELETE (when key columns are set) and INSERT script.
    pub async fn replace<I, K, V>(&mut self, values: I) -> BuilderResult<Outcome<u64>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.set_many(values);
        let table = match self.preflight("replace()") {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        if self.state.set.is_empty() {
            return self.fail("replace() requires at least one set() value");
        }

        let bare = Self::bare_table(&table).to_string();
        let indexes = self.conn.index_data(&bare).await?;
        let mut key_fields: Vec<String> = Vec::new();
        for index in indexes.iter().filter(|i| i.identifies_rows()) {
            for field in &index.fields {
                if !key_fields.iter().any(|f| f.eq_ignore_ascii_case(field)) {
                    key_fields.push(field.clone());
                }
            }
        }

        let matches = self.key_matches(&key_fields);
        tracing::debug!(
            target: "sqlsrv_builder",
            table = %bare,
            key_fields = ?key_fields,
            matched_columns = matches.len(),
            "replace: resolved key columns"
        );

        let full = self.full_name(&table);
        let keys: Vec<&str> = self.state.set.iter().map(|s| s.key_sql.as_str()).collect();
        let values: Vec<String> = self.state.set.iter().map(|s| s.value_sql()).collect();
        let insert = format!("INSERT INTO {full} ({}) VALUES ({})", keys.join(","), values.join(","));

        if self.test_mode {
            let mut script = Vec::new();
            if !matches.is_empty() {
                let deleter = self.key_filter(&table, &matches);
                script.push(deleter.inline(&deleter.compile_delete(&table)));
            }
            script.push(self.inline(&self.wrap_identity(&full, insert)));
            self.reset_write();
            return Ok(Outcome::Compiled(script.join("\n")));
        }

        if !matches.is_empty() {
            let mut finder = self.key_filter(&table, &matches);
            let found = finder.get(None, None, true).await?.executed().unwrap_or_default();
            tracing::debug!(target: "sqlsrv_builder", table = %bare, rows = found.len(), "replace: existing rows");
            if !found.is_empty() {
                let mut deleter = self.key_filter(&table, &matches);
                deleter.delete(None, None, true).await?;
            }
        }

        let result = if self.options.identity_insert {
            self.execute_simple(&format!("SET IDENTITY_INSERT {full} ON")).await?;
            let inserted = self.execute(&insert).await;
            let off = self.execute_simple(&format!("SET IDENTITY_INSERT {full} OFF")).await;
            inserted.and_then(|rs| off.map(|()| rs))
        } else {
            self.execute(&insert).await
        };
        self.reset_write();
        Ok(Outcome::Executed(result?.affected_rows))
    }

    /// SET entries whose column is one of `key_fields`.
    fn key_matches(&self, key_fields: &[String]) -> Vec<KeyMatch> {
        let protector = self.protector();
        self.state
            .set
            .iter()
            .filter(|item| {
                let column = protector.strip_quotes(unqualified(&item.column));
                key_fields.iter().any(|f| f.eq_ignore_ascii_case(&column))
            })
            .map(|item| match &item.value {
                SetValue::Bound(name) => KeyMatch::Bound(
                    item.column.clone(),
                    self.binds.get(name).cloned().unwrap_or(Value::Null),
                ),
                SetValue::Raw(sql) => KeyMatch::Raw(item.column.clone(), sql.clone()),
            })
            .collect()
    }

    /// A fresh builder on `table` filtered by every key match.
    fn key_filter(&self, table: &str, matches: &[KeyMatch]) -> Self {
        let mut builder = self.clean_clone();
        builder.from(table);
        for m in matches {
            match m {
                KeyMatch::Bound(column, value) => {
                    builder.where_(column, value.clone(), None);
                }
                KeyMatch::Raw(column, sql) => {
                    builder.where_raw(&format!("{column} = {sql}"), Some(false));
                }
            }
        }
        builder
    }
}
