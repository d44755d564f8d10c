//! SQL Server identifier handling.
//!
//! [`Protector`] escapes identifiers with the configured quoting style,
//! protects column references inside larger expressions, and resolves table
//! references into fully qualified `database.schema.table` names.
//!
//! # Example
//! ```ignore
//! let config = ConnectionConfig::new("shop");
//! let p = Protector::new(&config, &[]);
//!
//! assert_eq!(p.full_name("users u", true), r#""shop"."dbo"."users" u"#);
//! assert_eq!(p.protect("u.name AS n"), r#""u"."name" AS "n""#);
//! ```

use crate::config::{ConnectionConfig, Quoting};

/// Characters that mark an item as an expression rather than an identifier.
const EXPRESSION_CHARS: &[char] = &['(', ')', '\'', '+', '/', '%', '<', '>', '=', '!', '|', '&', ','];

/// Identifier escaping bound to one connection config and the aliases a
/// builder has seen so far.
#[derive(Debug, Clone, Copy)]
pub struct Protector<'a> {
    config: &'a ConnectionConfig,
    aliases: &'a [String],
}

impl<'a> Protector<'a> {
    pub fn new(config: &'a ConnectionConfig, aliases: &'a [String]) -> Self {
        Self { config, aliases }
    }

    /// Quote every dotted segment of `item`.
    ///
    /// `*`, numbers, string literals and anything containing a parenthesis are
    /// returned unchanged. Already-quoted segments are not quoted twice.
    pub fn escape(&self, item: &str) -> String {
        let item = item.trim();
        if self.config.quoting == Quoting::None || item.is_empty() || item == "*" {
            return item.to_string();
        }
        if item.starts_with('\'') || item.contains('(') || is_number(item) {
            return item.to_string();
        }

        item.split('.')
            .map(|segment| self.escape_segment(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn escape_segment(&self, segment: &str) -> String {
        let segment = segment.trim();
        let Some((open, close)) = self.config.quoting.chars() else {
            return segment.to_string();
        };
        if segment == "*" {
            return segment.to_string();
        }
        let bare = segment.trim_start_matches(open).trim_end_matches(close);
        format!("{open}{bare}{close}")
    }

    /// Protect a column or table reference, keeping expressions untouched.
    ///
    /// Handles trailing aliases (`col AS c`, `t.col c`) and, when a table
    /// prefix is configured, prefixes the table part of `table.column`
    /// unless that part is a known alias.
    pub fn protect(&self, item: &str) -> String {
        let item = item.trim();
        if self.config.quoting == Quoting::None && self.config.db_prefix.is_empty() {
            return item.to_string();
        }
        if is_opaque(item) {
            return item.to_string();
        }

        match split_alias(item) {
            Some((base, separator, alias)) => {
                format!("{}{}{}", self.protect_reference(base), separator, self.escape(alias))
            }
            None => self.protect_reference(item),
        }
    }

    /// [`protect`](Self::protect) when `escape` is set, the trimmed item otherwise.
    pub fn protect_if(&self, item: &str, escape: bool) -> String {
        if escape {
            self.protect(item)
        } else {
            item.trim().to_string()
        }
    }

    fn protect_reference(&self, reference: &str) -> String {
        let prefix = self.config.db_prefix.as_str();
        if prefix.is_empty() || !reference.contains('.') {
            return self.escape(reference);
        }

        let mut segments: Vec<String> = reference
            .split('.')
            .map(|s| self.strip_quotes(s))
            .collect();
        let table_idx = segments.len() - 2;
        let is_alias = self.aliases.iter().any(|a| *a == segments[0]);
        if !is_alias && !segments[table_idx].starts_with(prefix) {
            segments[table_idx] = format!("{prefix}{}", segments[table_idx]);
        }
        self.escape(&segments.join("."))
    }

    /// Remove the configured quoting characters.
    pub fn strip_quotes(&self, item: &str) -> String {
        match self.config.quoting.chars() {
            Some((open, close)) => item.trim().replace([open, close], ""),
            None => item.trim().to_string(),
        }
    }

    /// Resolve a table reference to `database.schema.table[ alias]`.
    ///
    /// - `"users"` uses the configured schema (or `dbo`)
    /// - `"sales.users"` keeps the caller's schema
    /// - `"other.sales.users"` keeps the caller's database and schema
    /// - `"users u"` carries the alias only when `include_alias` is set
    pub fn full_name(&self, table: &str, include_alias: bool) -> String {
        let table = self.strip_quotes(table);

        let (name, alias) = match table.find(char::is_whitespace) {
            Some(pos) => (&table[..pos], Some(table[pos..].trim())),
            None => (table.as_str(), None),
        };

        let parts: Vec<&str> = name.split('.').collect();
        let (database, schema, table_name) = match parts.as_slice() {
            [s, t] => (self.config.database.as_str(), *s, *t),
            [d, s, .., t] => (*d, *s, *t),
            _ => (self.config.database.as_str(), self.config.schema_or_default(), name),
        };

        let prefix = self.config.db_prefix.as_str();
        let table_name = if prefix.is_empty() || table_name.starts_with(prefix) {
            table_name.to_string()
        } else {
            format!("{prefix}{table_name}")
        };

        let mut out = format!(
            "{}.{}.{}",
            self.escape_segment(database),
            self.escape_segment(schema),
            self.escape_segment(&table_name)
        );
        if let (true, Some(alias)) = (include_alias, alias) {
            out.push(' ');
            out.push_str(alias);
        }
        out
    }
}

/// The alias of a `"table alias"` / `"table AS alias"` reference, if any.
pub fn table_alias(table: &str) -> Option<String> {
    let mut tokens: Vec<&str> = table.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    let alias = tokens.pop()?;
    if alias.eq_ignore_ascii_case("AS") {
        return None;
    }
    Some(alias.to_string())
}

/// Strip a leading table qualifier: `users.name` becomes `name`.
pub fn unqualified(column: &str) -> &str {
    let column = column.trim();
    column.rsplit('.').next().unwrap_or(column)
}

fn is_number(item: &str) -> bool {
    !item.is_empty() && item.parse::<f64>().is_ok()
}

fn is_placeholder(item: &str) -> bool {
    item.len() >= 2 && item.starts_with(':') && item.ends_with(':')
}

/// Items that must pass through protection untouched.
fn is_opaque(item: &str) -> bool {
    item.is_empty()
        || item == "*"
        || item.contains(EXPRESSION_CHARS)
        || is_number(item)
        || is_placeholder(item)
        || item.eq_ignore_ascii_case("NULL")
}

/// Split `"expr AS alias"` or `"expr alias"` into `(expr, separator, alias)`.
fn split_alias(item: &str) -> Option<(&str, &str, &str)> {
    let upper = item.to_ascii_uppercase();
    if let Some(pos) = upper.rfind(" AS ") {
        return Some((&item[..pos], " AS ", &item[pos + 4..]));
    }
    let pos = item.rfind(char::is_whitespace)?;
    Some((item[..pos].trim_end(), " ", &item[pos + 1..]))
}
