use super::{Builder, GroupItem, OrderItem, Outcome, SelectItem};
use crate::client::{Connection, Row};
use crate::condition::compile_clauses;
use crate::error::{BuilderError, BuilderResult};
use crate::ident::unqualified;

/// Derived-table alias used when counting DISTINCT / GROUP BY results.
const COUNT_ALIAS: &str = "count_all_results";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    Max,
    Min,
    Avg,
    Sum,
    Count,
}

impl Aggregate {
    fn keyword(self) -> &'static str {
        match self {
            Aggregate::Max => "MAX",
            Aggregate::Min => "MIN",
            Aggregate::Avg => "AVG",
            Aggregate::Sum => "SUM",
            Aggregate::Count => "COUNT",
        }
    }
}

/// Split a comma-separated list, ignoring commas inside parentheses or quotes.
pub(crate) fn split_list(input: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in input.char_indices() {
        if let Some(close) = quote {
            if ch == close {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '[' => quote = Some(']'),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(input[start..].trim());
    items.retain(|s| !s.is_empty());
    items
}

impl<'c, C: Connection> Builder<'c, C> {
    /// Add SELECT columns (comma-separated; expressions and aliases allowed).
    pub fn select(&mut self, fields: &str, escape: Option<bool>) -> &mut Self {
        let escape = self.escape_or_default(escape);
        for field in split_list(fields) {
            self.state.select.push(SelectItem {
                expr: field.to_string(),
                escape,
            });
        }
        self
    }

    /// Add a SELECT expression emitted exactly as written.
    pub fn select_raw(&mut self, expr: &str) -> &mut Self {
        let expr = expr.trim();
        if !expr.is_empty() {
            self.state.select.push(SelectItem {
                expr: expr.to_string(),
                escape: false,
            });
        }
        self
    }

    /// `SELECT MAX(column) AS alias`
    pub fn select_max(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.aggregate(Aggregate::Max, column, alias)
    }

    /// `SELECT MIN(column) AS alias`
    pub fn select_min(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.aggregate(Aggregate::Min, column, alias)
    }

    /// `SELECT AVG(CAST(column AS FLOAT)) AS alias`
    ///
    /// SQL Server averages integer columns with integer arithmetic; the cast
    /// keeps the fractional part.
    pub fn select_avg(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.aggregate(Aggregate::Avg, column, alias)
    }

    /// `SELECT SUM(column) AS alias`
    pub fn select_sum(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.aggregate(Aggregate::Sum, column, alias)
    }

    /// `SELECT COUNT(column) AS alias`
    pub fn select_count(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        self.aggregate(Aggregate::Count, column, alias)
    }

    fn aggregate(&mut self, kind: Aggregate, column: &str, alias: Option<&str>) -> &mut Self {
        let column = column.trim();
        let name = kind.keyword().to_ascii_lowercase();
        if column.is_empty() {
            self.record_error(format!("select_{name}() requires a column name"));
            return self;
        }
        if column.contains(',') {
            self.record_error(format!("select_{name}() accepts a single column, got `{column}`"));
            return self;
        }

        let alias = alias
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| unqualified(column));
        let protector = self.protector();
        let column_sql = protector.protect(column);
        let alias_sql = protector.escape(alias);

        let expr = match kind {
            Aggregate::Avg => format!("AVG(CAST({column_sql} AS FLOAT)) AS {alias_sql}"),
            other => format!("{}({column_sql}) AS {alias_sql}", other.keyword()),
        };
        self.state.select.push(SelectItem {
            expr,
            escape: false,
        });
        self
    }

    /// `SELECT DISTINCT`
    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.state.distinct = distinct;
        self
    }

    /// Add FROM tables (comma-separated, each optionally aliased).
    pub fn from(&mut self, tables: &str) -> &mut Self {
        for table in split_list(tables) {
            self.track_alias(table);
            self.state.from.push(table.to_string());
        }
        self
    }

    /// Add GROUP BY columns (comma-separated).
    pub fn group_by(&mut self, fields: &str, escape: Option<bool>) -> &mut Self {
        let escape = self.escape_or_default(escape);
        for field in split_list(fields) {
            self.state.group_by.push(GroupItem {
                field: field.to_string(),
                escape,
            });
        }
        self
    }

    /// Add ORDER BY columns.
    ///
    /// `direction` is `ASC`, `DESC`, empty, or `RANDOM`. With `RANDOM` a
    /// numeric `field` is used as the seed (`RAND(seed)`), otherwise rows are
    /// shuffled with `NEWID()`. Each comma-separated field may carry its own
    /// direction when `direction` is empty.
    pub fn order_by(&mut self, field: &str, direction: &str, escape: Option<bool>) -> &mut Self {
        let direction = direction.trim().to_ascii_uppercase();
        let field = field.trim();

        if direction == "RANDOM" {
            let random = if !field.is_empty() && field.bytes().all(|b| b.is_ascii_digit()) {
                format!("RAND({field})")
            } else {
                "NEWID()".to_string()
            };
            self.state.order_by.push(OrderItem {
                field: random,
                direction: String::new(),
                escape: false,
            });
            return self;
        }
        if field.is_empty() {
            return self;
        }

        let direction = match direction.as_str() {
            "ASC" | "DESC" => format!(" {direction}"),
            _ => String::new(),
        };
        let escape = self.escape_or_default(escape);
        if !escape {
            self.state.order_by.push(OrderItem {
                field: field.to_string(),
                direction,
                escape: false,
            });
            return self;
        }

        for item in split_list(field) {
            let (name, dir) = match split_direction(item) {
                Some((name, dir)) if direction.is_empty() => (name, format!(" {dir}")),
                _ => (item, direction.clone()),
            };
            self.state.order_by.push(OrderItem {
                field: name.to_string(),
                direction: dir,
                escape: true,
            });
        }
        self
    }

    /// Maximum number of rows. A limit of zero clears it.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.state.limit = (limit > 0).then_some(limit);
        self
    }

    /// Rows to skip before the first returned row.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.state.offset = Some(offset);
        self
    }

    // ── compilation ──

    fn compile_from(&self) -> String {
        let protector = self.protector();
        self.state
            .from
            .iter()
            .map(|t| {
                if t.trim_start().starts_with("(SELECT") {
                    t.clone()
                } else {
                    protector.full_name(t, true)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn compile_where(&self) -> String {
        if self.state.where_.is_empty() {
            return String::new();
        }
        format!(" WHERE {}", compile_clauses(&self.protector(), &self.state.where_))
    }

    fn compile_having(&self) -> String {
        if self.state.having.is_empty() {
            return String::new();
        }
        format!(" HAVING {}", compile_clauses(&self.protector(), &self.state.having))
    }

    fn compile_group_by(&self) -> String {
        if self.state.group_by.is_empty() {
            return String::new();
        }
        let protector = self.protector();
        let fields: Vec<String> = self
            .state
            .group_by
            .iter()
            .map(|g| protector.protect_if(&g.field, g.escape))
            .collect();
        format!(" GROUP BY {}", fields.join(", "))
    }

    pub(crate) fn compile_order_by(&self) -> String {
        if self.state.order_by.is_empty() {
            return String::new();
        }
        let protector = self.protector();
        let fields: Vec<String> = self
            .state
            .order_by
            .iter()
            .map(|o| format!("{}{}", protector.protect_if(&o.field, o.escape), o.direction))
            .collect();
        format!(" ORDER BY {}", fields.join(", "))
    }

    /// `OFFSET ... FETCH` pagination. SQL Server requires an ORDER BY, so one
    /// that keeps the server's order is injected when none was given.
    fn compile_limit(&self, sql: &mut String, offset_ignore: bool) {
        let offset = if offset_ignore {
            0
        } else {
            self.state.offset.unwrap_or(0)
        };
        match self.state.limit {
            Some(limit) => {
                if self.state.order_by.is_empty() {
                    sql.push_str(" ORDER BY (SELECT NULL)");
                }
                sql.push_str(&format!(" OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY"));
            }
            None if offset > 0 => {
                if self.state.order_by.is_empty() {
                    sql.push_str(" ORDER BY (SELECT NULL)");
                }
                sql.push_str(&format!(" OFFSET {offset} ROWS"));
            }
            None => {}
        }
    }

    /// Compile the SELECT with `:name:` bind markers.
    ///
    /// `select_override` replaces the `SELECT ...` head (used for counts).
    pub(crate) fn compile_select(&self, select_override: Option<&str>, offset_ignore: bool) -> String {
        let mut sql = match select_override {
            Some(head) => head.to_string(),
            None => {
                let mut head = String::from(if self.state.distinct {
                    "SELECT DISTINCT "
                } else {
                    "SELECT "
                });
                let protector = self.protector();
                // SQL Server rejects SELECT * with GROUP BY.
                let items: Vec<String> = if !self.state.select.is_empty() {
                    self.state
                        .select
                        .iter()
                        .map(|s| protector.protect_if(&s.expr, s.escape))
                        .collect()
                } else if !self.state.group_by.is_empty() {
                    self.state
                        .group_by
                        .iter()
                        .map(|g| protector.protect_if(&g.field, g.escape))
                        .collect()
                } else {
                    vec!["*".to_string()]
                };
                head.push_str(&items.join(", "));
                head
            }
        };

        if !self.state.from.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&self.compile_from());
        }
        for join in &self.state.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(&self.compile_where());
        sql.push_str(&self.compile_group_by());
        sql.push_str(&self.compile_having());
        sql.push_str(&self.compile_order_by());
        self.compile_limit(&mut sql, offset_ignore);
        sql
    }

    /// The SELECT as a self-contained string with literals inlined.
    pub(crate) fn compile_select_inline(&self) -> String {
        self.inline(&self.compile_select(None, false))
    }

    // ── terminals ──

    /// Compile and run the SELECT.
    pub async fn get(
        &mut self,
        limit: Option<u64>,
        offset: Option<u64>,
        reset: bool,
    ) -> BuilderResult<Outcome<Vec<Row>>> {
        if let Some(limit) = limit {
            self.limit(limit);
        }
        if let Some(offset) = offset {
            self.offset(offset);
        }
        if let Err(message) = self.preflight_select("get()") {
            return self.fail(message);
        }

        let sql = self.compile_select(None, false);
        if self.test_mode {
            let compiled = self.inline(&sql);
            if reset {
                self.reset_select();
            }
            return Ok(Outcome::Compiled(compiled));
        }

        let result = self.execute(&sql).await;
        if reset {
            self.reset_select();
        }
        Ok(Outcome::Executed(result?.rows))
    }

    /// The SELECT that `get` would run, with literals inlined.
    pub fn get_compiled_select(&mut self, reset: bool) -> BuilderResult<String> {
        if let Some(message) = self.build_error.take() {
            return Err(BuilderError::Usage(message));
        }
        let sql = self.compile_select_inline();
        if reset {
            self.reset_select();
        }
        Ok(sql)
    }

    /// `SELECT COUNT(*) AS "numrows" FROM <table>`, ignoring every filter.
    pub async fn count_all(&mut self, reset: bool) -> BuilderResult<Outcome<i64>> {
        let table = match self.preflight("count_all()") {
            Ok(table) => table,
            Err(message) => return self.fail(message),
        };
        let protector = self.protector();
        let sql = format!(
            "SELECT COUNT(*) AS {} FROM {}",
            protector.escape("numrows"),
            protector.full_name(&table, false)
        );

        if self.test_mode {
            if reset {
                self.reset_select();
            }
            return Ok(Outcome::Compiled(sql));
        }

        let result = self.execute(&sql).await;
        if reset {
            self.reset_select();
        }
        Ok(Outcome::Executed(count_from(&result?.rows)))
    }

    /// Count the rows the current SELECT would return (ORDER BY, LIMIT and
    /// OFFSET are ignored).
    pub async fn count_all_results(&mut self, reset: bool) -> BuilderResult<Outcome<i64>> {
        if let Err(message) = self.preflight_select("count_all_results()") {
            return self.fail(message);
        }

        let order_by = std::mem::take(&mut self.state.order_by);
        let limit = self.state.limit.take();
        let numrows = self.protector().escape("numrows");

        let sql = if self.state.distinct || !self.state.group_by.is_empty() {
            format!(
                "SELECT COUNT(*) AS {numrows} FROM ({}) {COUNT_ALIAS}",
                self.compile_select(None, true)
            )
        } else {
            self.compile_select(Some(&format!("SELECT COUNT(*) AS {numrows}")), true)
        };

        let outcome = if self.test_mode {
            Ok(Outcome::Compiled(self.inline(&sql)))
        } else {
            self.execute(&sql)
                .await
                .map(|rs| Outcome::Executed(count_from(&rs.rows)))
        };

        if reset {
            self.reset_select();
        } else {
            self.state.order_by = order_by;
            self.state.limit = limit;
        }
        outcome
    }

    /// SELECT needs no table when it only selects expressions.
    fn preflight_select(&mut self, operation: &str) -> Result<(), String> {
        self.check_pending(operation)
    }
}

fn count_from(rows: &[Row]) -> i64 {
    rows.first()
        .and_then(|row| row.get("numrows").or_else(|| row.get_index(0)))
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}

/// Split `"name DESC"` into `("name", "DESC")`.
fn split_direction(item: &str) -> Option<(&str, &str)> {
    let item = item.trim_end();
    let pos = item.rfind(char::is_whitespace)?;
    let dir = &item[pos + 1..];
    if dir.eq_ignore_ascii_case("ASC") || dir.eq_ignore_ascii_case("DESC") {
        let dir = if dir.eq_ignore_ascii_case("ASC") { "ASC" } else { "DESC" };
        Some((item[..pos].trim(), dir))
    } else {
        None
    }
}
