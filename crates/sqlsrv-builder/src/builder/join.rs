use super::Builder;
use crate::client::Connection;
use crate::condition::protect_join_condition;
use crate::operator::has_operator;

/// Join types accepted by [`Builder::join`].
const JOIN_TYPES: &[&str] = &[
    "LEFT",
    "RIGHT",
    "OUTER",
    "INNER",
    "LEFT OUTER",
    "RIGHT OUTER",
    "FULL",
    "FULL OUTER",
    "CROSS",
];

impl<'c, C: Connection> Builder<'c, C> {
    /// Add a JOIN.
    ///
    /// - `join_type` is matched case-insensitively against the supported
    ///   types; anything else yields a plain `JOIN`
    /// - a `condition` without an operator becomes `USING (...)`
    /// - with escaping on, both sides of every comparison in `condition` are
    ///   protected and the table is fully qualified (its alias kept)
    pub fn join(
        &mut self,
        table: &str,
        condition: &str,
        join_type: &str,
        escape: Option<bool>,
    ) -> &mut Self {
        let table = table.trim();
        if table.is_empty() {
            self.record_error("join() requires a table");
            return self;
        }

        let join_type = join_type.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        let join_type = if JOIN_TYPES.contains(&join_type.as_str()) {
            format!("{join_type} ")
        } else {
            String::new()
        };

        self.track_alias(table);
        let escape = self.escape_or_default(escape);
        let condition = condition.trim();
        let protector = self.protector();

        let condition = if condition.is_empty() {
            String::new()
        } else if !has_operator(condition) {
            let columns = if escape {
                super::select::split_list(condition)
                    .into_iter()
                    .map(|c| protector.escape(c))
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                condition.to_string()
            };
            format!(" USING ({columns})")
        } else if !escape {
            format!(" ON {condition}")
        } else {
            format!(" ON {}", protect_join_condition(&protector, condition))
        };

        let table = if escape {
            protector.full_name(table, true)
        } else {
            table.to_string()
        };

        self.state
            .joins
            .push(format!("{join_type}JOIN {table}{condition}"));
        self
    }

    /// `INNER JOIN table ON condition`
    pub fn inner_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join(table, condition, "INNER", None)
    }

    /// `LEFT JOIN table ON condition`
    pub fn left_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join(table, condition, "LEFT", None)
    }

    /// `RIGHT JOIN table ON condition`
    pub fn right_join(&mut self, table: &str, condition: &str) -> &mut Self {
        self.join(table, condition, "RIGHT", None)
    }
}
