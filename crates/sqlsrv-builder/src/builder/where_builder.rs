use super::Builder;
use crate::client::Connection;
use crate::condition::WhereClause;
use crate::operator::{has_operator, null_comparison, strip_operator};
use crate::value::Value;

/// Where `%` wildcards go in a LIKE pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeSide {
    /// `%match%`
    #[default]
    Both,
    /// `%match`
    Before,
    /// `match%`
    After,
    /// `match`, exact
    None,
}

/// Character used in `LIKE ... ESCAPE '!'`.
const LIKE_ESCAPE: char = '!';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Where,
    Having,
}

/// Right-hand side of a comparison.
enum Operand {
    Value(Value),
    /// Compiled sub-select, literals already inlined.
    Subquery(String),
}

fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '!' | '%' | '_') {
            out.push(LIKE_ESCAPE);
        }
        out.push(ch);
    }
    out
}

impl<'c, C: Connection> Builder<'c, C> {
    /// `AND key = value`.
    ///
    /// `key` may end in an operator (`"age >="`, `"name LIKE"`, `"deleted_at IS NOT"`).
    /// A NULL value turns the comparison into `IS NULL` / `IS NOT NULL`.
    /// With `escape` off the value is embedded as raw SQL instead of bound.
    pub fn where_(&mut self, key: &str, value: impl Into<Value>, escape: Option<bool>) -> &mut Self {
        self.where_having(Target::Where, key, Operand::Value(value.into()), "AND ", escape)
    }

    /// `OR key = value`.
    pub fn or_where(&mut self, key: &str, value: impl Into<Value>, escape: Option<bool>) -> &mut Self {
        self.where_having(Target::Where, key, Operand::Value(value.into()), "OR ", escape)
    }

    /// `AND <condition>`, a complete condition string such as `"a.id = b.a_id"`.
    pub fn where_raw(&mut self, condition: &str, escape: Option<bool>) -> &mut Self {
        self.push_raw_condition(Target::Where, condition, "AND ", escape)
    }

    /// `OR <condition>`.
    pub fn or_where_raw(&mut self, condition: &str, escape: Option<bool>) -> &mut Self {
        self.push_raw_condition(Target::Where, condition, "OR ", escape)
    }

    /// `AND key = (SELECT ...)`, where the sub-select is built by `build`
    /// on a clean clone of this builder.
    pub fn where_sub<F>(&mut self, key: &str, build: F) -> &mut Self
    where
        F: FnOnce(&mut Builder<'c, C>),
    {
        let sql = self.subquery_sql(build);
        self.where_having(Target::Where, key, Operand::Subquery(sql), "AND ", None)
    }

    /// `OR key = (SELECT ...)`.
    pub fn or_where_sub<F>(&mut self, key: &str, build: F) -> &mut Self
    where
        F: FnOnce(&mut Builder<'c, C>),
    {
        let sql = self.subquery_sql(build);
        self.where_having(Target::Where, key, Operand::Subquery(sql), "OR ", None)
    }

    /// `AND key IN (...)`. An empty list matches nothing.
    pub fn where_in<I, V>(&mut self, key: &str, values: I, escape: Option<bool>) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_in_inner(key, collect(values), false, "AND ", escape)
    }

    /// `OR key IN (...)`.
    pub fn or_where_in<I, V>(&mut self, key: &str, values: I, escape: Option<bool>) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_in_inner(key, collect(values), false, "OR ", escape)
    }

    /// `AND key NOT IN (...)`. An empty list matches everything.
    pub fn where_not_in<I, V>(&mut self, key: &str, values: I, escape: Option<bool>) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_in_inner(key, collect(values), true, "AND ", escape)
    }

    /// `OR key NOT IN (...)`.
    pub fn or_where_not_in<I, V>(&mut self, key: &str, values: I, escape: Option<bool>) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.where_in_inner(key, collect(values), true, "OR ", escape)
    }

    /// `AND key IN (SELECT ...)`.
    pub fn where_in_sub<F>(&mut self, key: &str, build: F) -> &mut Self
    where
        F: FnOnce(&mut Builder<'c, C>),
    {
        let sql = self.subquery_sql(build);
        let prefix = self.clause_prefix(Target::Where, "AND ");
        let escape = self.escape_or_default(None);
        self.state.where_.push(WhereClause::new(
            prefix,
            format!("{} IN ({sql})", key.trim()),
            escape,
        ));
        self
    }

    /// `AND field LIKE '%match%' ESCAPE '!'`.
    pub fn like(&mut self, field: &str, pattern: &str, side: LikeSide) -> &mut Self {
        self.like_inner(field, pattern, side, false, "AND ")
    }

    /// `OR field LIKE ...`.
    pub fn or_like(&mut self, field: &str, pattern: &str, side: LikeSide) -> &mut Self {
        self.like_inner(field, pattern, side, false, "OR ")
    }

    /// `AND field NOT LIKE ...`.
    pub fn not_like(&mut self, field: &str, pattern: &str, side: LikeSide) -> &mut Self {
        self.like_inner(field, pattern, side, true, "AND ")
    }

    /// `OR field NOT LIKE ...`.
    pub fn or_not_like(&mut self, field: &str, pattern: &str, side: LikeSide) -> &mut Self {
        self.like_inner(field, pattern, side, true, "OR ")
    }

    /// `AND key = value` in the HAVING clause.
    pub fn having(&mut self, key: &str, value: impl Into<Value>, escape: Option<bool>) -> &mut Self {
        self.where_having(Target::Having, key, Operand::Value(value.into()), "AND ", escape)
    }

    /// `OR key = value` in the HAVING clause.
    pub fn or_having(&mut self, key: &str, value: impl Into<Value>, escape: Option<bool>) -> &mut Self {
        self.where_having(Target::Having, key, Operand::Value(value.into()), "OR ", escape)
    }

    /// `AND <condition>` in the HAVING clause.
    pub fn having_raw(&mut self, condition: &str, escape: Option<bool>) -> &mut Self {
        self.push_raw_condition(Target::Having, condition, "AND ", escape)
    }

    /// Open `AND (`.
    pub fn group_start(&mut self) -> &mut Self {
        self.group_start_inner("", "AND ")
    }

    /// Open `OR (`.
    pub fn or_group_start(&mut self) -> &mut Self {
        self.group_start_inner("", "OR ")
    }

    /// Open `AND NOT (`.
    pub fn not_group_start(&mut self) -> &mut Self {
        self.group_start_inner("NOT ", "AND ")
    }

    /// Open `OR NOT (`.
    pub fn or_not_group_start(&mut self) -> &mut Self {
        self.group_start_inner("NOT ", "OR ")
    }

    /// Close the innermost group. A group with nothing in it is dropped.
    pub fn group_end(&mut self) -> &mut Self {
        if self.state.where_group_depth == 0 {
            self.record_error("group_end() without a matching group_start()");
            return self;
        }
        self.state.where_group_depth -= 1;
        if self.state.where_.last().is_some_and(is_group_open) {
            self.state.where_.pop();
            self.state.where_group_started = self.state.where_.last().is_some_and(is_group_open);
        } else {
            self.state.where_group_started = false;
            self.state.where_.push(WhereClause::raw("", ")"));
        }
        self
    }

    /// Whether WHERE holds a condition, not just group parentheses.
    pub(crate) fn has_where_predicate(&self) -> bool {
        self.state
            .where_
            .iter()
            .any(|clause| !is_group_open(clause) && !is_group_close(clause))
    }

    // ── internals ──

    /// The connective for the next entry: none for the first entry of the
    /// clause or of a freshly opened group.
    fn clause_prefix(&mut self, target: Target, connective: &str) -> String {
        let started = std::mem::take(&mut self.state.where_group_started);
        let empty = match target {
            Target::Where => self.state.where_.is_empty(),
            Target::Having => self.state.having.is_empty(),
        };
        if started || empty {
            String::new()
        } else {
            connective.to_string()
        }
    }

    fn push_clause(&mut self, target: Target, clause: WhereClause) {
        match target {
            Target::Where => self.state.where_.push(clause),
            Target::Having => self.state.having.push(clause),
        }
    }

    fn where_having(
        &mut self,
        target: Target,
        key: &str,
        operand: Operand,
        connective: &str,
        escape: Option<bool>,
    ) -> &mut Self {
        let escape = self.escape_or_default(escape);
        let key = key.trim();
        let op = if has_operator(key) { "" } else { " =" };

        let condition = match operand {
            Operand::Value(Value::Null) => {
                if !has_operator(key) {
                    match target {
                        Target::Where => format!("{key} IS NULL"),
                        Target::Having => key.to_string(),
                    }
                } else {
                    null_comparison(key).unwrap_or_else(|| key.to_string())
                }
            }
            Operand::Value(value) if escape => {
                let name = self.bind(strip_operator(key), value);
                format!("{key}{op} :{name}:")
            }
            Operand::Value(value) => format!("{key}{op} {}", value.to_raw_sql()),
            Operand::Subquery(sql) => format!("{key}{op} ({sql})"),
        };

        let prefix = self.clause_prefix(target, connective);
        self.push_clause(target, WhereClause::new(prefix, condition, escape));
        self
    }

    fn push_raw_condition(
        &mut self,
        target: Target,
        condition: &str,
        connective: &str,
        escape: Option<bool>,
    ) -> &mut Self {
        let condition = condition.trim();
        if condition.is_empty() {
            return self;
        }
        let escape = self.escape_or_default(escape);
        let prefix = self.clause_prefix(target, connective);
        self.push_clause(target, WhereClause::new(prefix, condition, escape));
        self
    }

    fn where_in_inner(
        &mut self,
        key: &str,
        values: Vec<Value>,
        not: bool,
        connective: &str,
        escape: Option<bool>,
    ) -> &mut Self {
        let key = key.trim();
        if key.is_empty() {
            self.record_error("where_in() requires a column name");
            return self;
        }
        let escape = self.escape_or_default(escape);
        let prefix = self.clause_prefix(Target::Where, connective);

        if values.is_empty() {
            let never = if not { "1=1" } else { "1=0" };
            self.state.where_.push(WhereClause::raw(prefix, never));
            return self;
        }

        let items: Vec<String> = values
            .into_iter()
            .map(|value| {
                if escape {
                    format!(":{}:", self.bind(key, value))
                } else {
                    value.to_raw_sql()
                }
            })
            .collect();
        let not = if not { "NOT " } else { "" };
        let condition = format!("{key} {not}IN ({})", items.join(", "));
        self.state.where_.push(WhereClause::new(prefix, condition, escape));
        self
    }

    fn like_inner(
        &mut self,
        field: &str,
        pattern: &str,
        side: LikeSide,
        not: bool,
        connective: &str,
    ) -> &mut Self {
        let field = field.trim();
        if field.is_empty() {
            self.record_error("like() requires a column name");
            return self;
        }
        let escaped = escape_like(pattern);
        let pattern = match side {
            LikeSide::Both => format!("%{escaped}%"),
            LikeSide::Before => format!("%{escaped}"),
            LikeSide::After => format!("{escaped}%"),
            LikeSide::None => escaped,
        };
        let escape = self.escape_or_default(None);
        let prefix = self.clause_prefix(Target::Where, connective);
        let name = self.bind(field, Value::Text(pattern));
        let not = if not { "NOT " } else { "" };
        let condition = format!("{field} {not}LIKE :{name}: ESCAPE '{LIKE_ESCAPE}'");
        self.state.where_.push(WhereClause::new(prefix, condition, escape));
        self
    }

    fn group_start_inner(&mut self, not: &str, connective: &str) -> &mut Self {
        let prefix = self.clause_prefix(Target::Where, connective);
        self.state.where_group_started = true;
        self.state.where_group_depth += 1;
        self.state
            .where_
            .push(WhereClause::raw(format!("{prefix}{not}"), "("));
        self
    }

    fn subquery_sql<F>(&mut self, build: F) -> String
    where
        F: FnOnce(&mut Builder<'c, C>),
    {
        let mut sub = self.clean_clone();
        build(&mut sub);
        if let Some(message) = sub.build_error.take() {
            self.record_error(format!("sub-select: {message}"));
        }
        sub.compile_select_inline()
    }
}

fn collect<I, V>(values: I) -> Vec<Value>
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    values.into_iter().map(Into::into).collect()
}

fn is_group_open(clause: &WhereClause) -> bool {
    !clause.escape && clause.condition == "("
}

fn is_group_close(clause: &WhereClause) -> bool {
    !clause.escape && clause.condition == ")"
}
