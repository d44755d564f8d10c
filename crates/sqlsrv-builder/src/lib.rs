//! # sqlsrv-builder
//!
//! A query builder that compiles to Microsoft SQL Server's dialect.
//!
//! ## Features
//!
//! - **Fully qualified names**: tables resolve to `database.schema.table`
//!   with double-quote, bracket or no identifier quoting
//! - **Bound values**: every value becomes an `@Pn` parameter; compile-only
//!   mode inlines escaped literals instead
//! - **Dialect emulations**: `OFFSET ... FETCH` pagination, REPLACE via
//!   delete-then-insert, batched UPDATE via `CASE`, `IDENTITY_INSERT`
//!   wrapping, text-safe increment/decrement, float `AVG`
//! - **Safe defaults**: DELETE requires WHERE; INSERT/UPDATE/REPLACE require SET
//! - **Hooks**: inspect, rewrite or abort statements and log them with `tracing`
//!
//! ```ignore
//! use sqlsrv_builder::{Builder, Outcome};
//!
//! let mut qb = Builder::new(&conn, "jobs j");
//! qb.select("j.id, j.name", None)
//!     .left_join("users u", "u.id = j.owner_id")
//!     .where_("j.status", "open", None)
//!     .where_("j.deleted_at", None::<i64>, None);
//! let rows = qb.get(Some(10), Some(20), true).await?;
//!
//! // Compile-only
//! qb.test_mode(true).set("name", "nightly", None);
//! let Outcome::Compiled(sql) = qb.insert().await? else { unreachable!() };
//! assert_eq!(sql, r#"INSERT INTO "shop"."dbo"."jobs" ("name") VALUES ('nightly')"#);
//! ```

pub mod binds;
pub mod builder;
pub mod client;
pub mod condition;
pub mod config;
pub mod error;
pub mod ident;
pub mod monitor;
pub mod operator;
pub mod split;
pub mod value;

pub use binds::{Binds, Statement};
pub use builder::{BatchRow, Builder, LikeSide, Outcome};
pub use client::{Connection, IndexData, KeyType, ResultSet, Row};
pub use config::{BuilderOptions, Config, ConnectionConfig, DEFAULT_SCHEMA, Quoting};
pub use error::{BuilderError, BuilderResult, DbError};
pub use monitor::{CompositeHook, HookAction, QueryContext, QueryHook, QueryResult, QueryType, TracingSqlHook};
pub use value::Value;
