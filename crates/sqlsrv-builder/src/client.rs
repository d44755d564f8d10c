//! The database collaborator contract.
//!
//! The builder never talks to a driver directly. Anything that can run a
//! parameterized statement against SQL Server and describe a table's keys
//! implements [`Connection`].

use crate::config::ConnectionConfig;
use crate::error::BuilderResult;
use crate::value::Value;

/// A database connection (or transaction) the builder executes against.
///
/// Positional parameters in `sql` are written `@P1`, `@P2`, ... and match
/// `params` by index.
pub trait Connection: Send + Sync {
    /// Naming and quoting settings for statements compiled against this connection.
    fn config(&self) -> &ConnectionConfig;

    /// Execute a parameterized statement.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = BuilderResult<ResultSet>> + Send;

    /// Execute SQL without binds (`SET IDENTITY_INSERT ...`).
    fn simple_query(&self, sql: &str) -> impl std::future::Future<Output = BuilderResult<()>> + Send;

    /// Key metadata (primary keys, unique constraints, indexes) for `table`.
    ///
    /// `table` is the bare table name as given to the builder.
    fn index_data(
        &self,
        table: &str,
    ) -> impl std::future::Future<Output = BuilderResult<Vec<IndexData>>> + Send;
}

/// One result row, addressed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.columns.push(column.into());
        self.values.push(value.into());
        self
    }

    /// Value of `column` (case-insensitive, as SQL Server collations usually are).
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    /// Value at `index`.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rows returned by a statement plus the affected-row count reported by the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
    pub affected_rows: u64,
}

impl ResultSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            affected_rows: 0,
        }
    }

    /// A result carrying only an affected-row count.
    pub fn affected(n: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected_rows: n,
        }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Kind of a table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Primary,
    Unique,
    Index,
}

/// One key or index on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexData {
    pub name: String,
    pub key_type: KeyType,
    pub fields: Vec<String>,
}

impl IndexData {
    pub fn new(name: impl Into<String>, key_type: KeyType, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            key_type,
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    /// PRIMARY and UNIQUE keys identify rows; plain indexes do not.
    pub fn identifies_rows(&self) -> bool {
        matches!(self.key_type, KeyType::Primary | KeyType::Unique)
    }
}
