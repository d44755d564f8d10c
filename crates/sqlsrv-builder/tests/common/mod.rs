//! A recording connection for integration tests.
//!
//! Every call is logged in order. `query` answers from a queue of canned
//! results and falls back to an empty result set.

#![allow(dead_code)]

use sqlsrv_builder::{
    BuilderError, BuilderResult, Connection, ConnectionConfig, IndexData, ResultSet, Value,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Query { sql: String, params: Vec<Value> },
    Simple(String),
    IndexData(String),
}

pub struct MockConn {
    config: ConnectionConfig,
    calls: Mutex<Vec<Call>>,
    results: Mutex<VecDeque<BuilderResult<ResultSet>>>,
    indexes: HashMap<String, Vec<IndexData>>,
}

impl MockConn {
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::new("test"))
    }

    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            config,
            calls: Mutex::new(Vec::new()),
            results: Mutex::new(VecDeque::new()),
            indexes: HashMap::new(),
        }
    }

    /// Register a key for `table`.
    pub fn with_index(mut self, table: &str, index: IndexData) -> Self {
        self.indexes.entry(table.to_string()).or_default().push(index);
        self
    }

    /// Queue the result of the next `query` call.
    pub fn push_result(&self, result: ResultSet) {
        self.results.lock().unwrap().push_back(Ok(result));
    }

    /// Make the next `query` call fail with a database error.
    pub fn push_error(&self, message: &str) {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(BuilderError::database(message.to_string())));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that would have reached the server (queries and simple queries).
    pub fn executed(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::IndexData(_)))
            .collect()
    }

    /// SQL text of every `query` call.
    pub fn query_sql(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Query { sql, .. } => Some(sql),
                _ => None,
            })
            .collect()
    }
}

impl Connection for MockConn {
    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    async fn query(&self, sql: &str, params: &[Value]) -> BuilderResult<ResultSet> {
        self.calls.lock().unwrap().push(Call::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ResultSet::default()))
    }

    async fn simple_query(&self, sql: &str) -> BuilderResult<()> {
        self.calls.lock().unwrap().push(Call::Simple(sql.to_string()));
        Ok(())
    }

    async fn index_data(&self, table: &str) -> BuilderResult<Vec<IndexData>> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::IndexData(table.to_string()));
        Ok(self.indexes.get(table).cloned().unwrap_or_default())
    }
}

pub fn query(sql: &str, params: Vec<Value>) -> Call {
    Call::Query {
        sql: sql.to_string(),
        params,
    }
}
