//! Named placeholder registry.
//!
//! Compiled statement text refers to bound values with `:name:` markers.
//! Before execution the markers are rewritten to SQL Server positional
//! parameters (`@P1`, `@P2`, ...); in compile-only mode they are replaced by
//! escaped literals instead.

use crate::value::Value;
use std::collections::HashMap;

/// A statement ready for the database collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `@Pn` placeholders
    pub sql: String,
    /// Parameter values in placeholder order
    pub params: Vec<Value>,
}

/// Bind values keyed by generated placeholder name.
#[derive(Debug, Clone, Default)]
pub struct Binds {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
    key_counts: HashMap<String, usize>,
}

impl Binds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `key` and return the placeholder name.
    ///
    /// The first use of a key keeps it as-is; later uses get `key.1`,
    /// `key.2`, ... so the same column can be bound several times.
    pub fn bind(&mut self, key: &str, value: Value) -> String {
        let key = key.trim();
        let name = if self.index.contains_key(key) {
            let mut name;
            loop {
                let count = self.key_counts.entry(key.to_string()).or_insert(1);
                name = format!("{key}.{count}");
                *count += 1;
                if !self.index.contains_key(&name) {
                    break;
                }
            }
            name
        } else {
            key.to_string()
        };

        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name.clone(), value));
        name
    }

    /// Look up a bound value by placeholder name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.key_counts.clear();
    }

    /// Rewrite `:name:` markers to `@Pn` and collect the values in order.
    pub fn to_statement(&self, sql: &str) -> Statement {
        let mut params = Vec::new();
        let sql = self.substitute(sql, |value| {
            params.push(value.clone());
            format!("@P{}", params.len())
        });
        Statement { sql, params }
    }

    /// Rewrite `:name:` markers to escaped literals.
    pub fn inline(&self, sql: &str) -> String {
        self.substitute(sql, Value::to_literal)
    }

    /// Replace every marker naming a registered bind. Markers inside quoted
    /// string literals and unknown `:word:` sequences are left alone.
    fn substitute(&self, sql: &str, mut render: impl FnMut(&Value) -> String) -> String {
        if self.entries.is_empty() {
            return sql.to_string();
        }

        let mut out = String::with_capacity(sql.len());
        let mut in_string = false;
        let mut rest = sql;

        while let Some(ch) = rest.chars().next() {
            if ch == '\'' {
                in_string = !in_string;
            } else if ch == ':' && !in_string {
                if let Some(end) = rest[1..].find(':') {
                    let name = &rest[1..1 + end];
                    if let Some(value) = self.get(name) {
                        out.push_str(&render(value));
                        rest = &rest[end + 2..];
                        continue;
                    }
                }
            }
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
        out
    }
}
