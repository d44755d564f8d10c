//! Connection and builder configuration.
//!
//! Both halves deserialize from TOML:
//!
//! ```toml
//! [connection]
//! database = "shop"
//! schema = "sales"
//! quoting = "brackets"
//!
//! [builder]
//! strict = true
//! identity_insert = false
//! batch_size = 100
//! # update_batch_size = 500
//! ```

use crate::error::{BuilderError, BuilderResult};
use serde::Deserialize;
use std::path::Path;

/// Schema used when neither the table reference nor the configuration names one.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// How identifiers are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quoting {
    /// SQL-92 quoted identifiers (`"name"`), requires `QUOTED_IDENTIFIER ON`.
    #[default]
    DoubleQuote,
    /// T-SQL brackets (`[name]`).
    Brackets,
    /// No escaping.
    None,
}

impl Quoting {
    /// Opening and closing characters, if any.
    pub fn chars(self) -> Option<(char, char)> {
        match self {
            Quoting::DoubleQuote => Some(('"', '"')),
            Quoting::Brackets => Some(('[', ']')),
            Quoting::None => None,
        }
    }
}

/// Settings owned by the database collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Database (catalog) name, first part of every fully qualified table name.
    pub database: String,
    /// Default schema; `dbo` when unset.
    #[serde(default)]
    pub schema: Option<String>,
    /// Identifier escaping style.
    #[serde(default)]
    pub quoting: Quoting,
    /// Whether identifiers are protected unless a call opts out.
    #[serde(default = "default_true")]
    pub protect_identifiers: bool,
    /// Prefix prepended to table names.
    #[serde(default)]
    pub db_prefix: String,
}

impl ConnectionConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: None,
            quoting: Quoting::default(),
            protect_identifiers: true,
            db_prefix: String::new(),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_quoting(mut self, quoting: Quoting) -> Self {
        self.quoting = quoting;
        self
    }

    pub fn with_db_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.db_prefix = prefix.into();
        self
    }

    pub fn with_protect_identifiers(mut self, protect: bool) -> Self {
        self.protect_identifiers = protect;
        self
    }

    /// The configured schema, or [`DEFAULT_SCHEMA`].
    pub fn schema_or_default(&self) -> &str {
        match self.schema.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => DEFAULT_SCHEMA,
        }
    }
}

/// Per-builder behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    /// Usage errors are returned as `Err` when set; otherwise the terminal
    /// call is skipped and a warning is logged.
    pub strict: bool,
    /// Increment/decrement through `CONVERT` so numeric text columns work.
    pub cast_text_to_int: bool,
    /// Wrap INSERT/UPDATE in `SET IDENTITY_INSERT ... ON/OFF`.
    pub identity_insert: bool,
    /// Rows per statement for batched INSERT.
    pub batch_size: usize,
    /// Rows per statement for batched UPDATE. `None` compiles every row
    /// into a single statement.
    pub update_batch_size: Option<usize>,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            strict: true,
            cast_text_to_int: true,
            identity_insert: false,
            batch_size: 100,
            update_batch_size: None,
        }
    }
}

impl BuilderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn cast_text_to_int(mut self, cast: bool) -> Self {
        self.cast_text_to_int = cast;
        self
    }

    pub fn identity_insert(mut self, enabled: bool) -> Self {
        self.identity_insert = enabled;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Split batched UPDATE into statements of at most `size` rows.
    pub fn update_batch_size(mut self, size: usize) -> Self {
        self.update_batch_size = Some(size.max(1));
        self
    }
}

/// A configuration file with `[connection]` and `[builder]` sections.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub builder: BuilderOptions,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> BuilderResult<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> BuilderResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BuilderError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> BuilderResult<()> {
        if self.connection.database.trim().is_empty() {
            return Err(BuilderError::Config("connection.database must not be empty".into()));
        }
        if self.builder.batch_size == 0 {
            return Err(BuilderError::Config("builder.batch_size must be at least 1".into()));
        }
        if self.builder.update_batch_size == Some(0) {
            return Err(BuilderError::Config("builder.update_batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}
