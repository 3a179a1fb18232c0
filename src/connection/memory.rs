use async_trait::async_trait;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

use crate::core::{MapError, Result};
use crate::interface::DatabaseClient;
use crate::result::QueryResult;
use crate::schema::Statement;

type Table = BTreeMap<String, String>;

/// In-process client that executes collection statements against plain maps.
///
/// Behaves like the PostgreSQL client for the statements a persistent
/// collection issues: tables must be created before use, upserts overwrite by
/// key, deletes of missing keys succeed. Useful for tests and for running
/// without a server.
#[derive(Default)]
pub struct MemoryClient {
    tables: RwLock<HashMap<String, Table>>,
    history: Mutex<Vec<(String, Vec<String>)>>,
    pending_failure: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next statement fail with a storage error.
    pub async fn fail_next(&self, message: &str) {
        *self.pending_failure.lock().await = Some(message.to_string());
    }

    /// Every statement received so far, as `(sql, params)`.
    pub async fn history(&self) -> Vec<(String, Vec<String>)> {
        self.history.lock().await.clone()
    }

    /// Direct read of a stored row, bypassing any adapter.
    pub async fn raw_value(&self, table: &str, key: &str) -> Option<String> {
        self.tables.read().await.get(table)?.get(key).cloned()
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        self.tables.read().await.contains_key(table)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn key_value_result(rows: Vec<(String, String)>) -> QueryResult {
        QueryResult::new(
            vec!["key".into(), "value".into()],
            rows.into_iter().map(|(k, v)| vec![k, v]).collect(),
        )
    }

    fn apply(table: &mut Table, statement: &Statement) -> QueryResult {
        match statement {
            Statement::CreateTable { .. } => QueryResult::affected(0),
            Statement::SelectAll { .. } => Self::key_value_result(
                table.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ),
            Statement::SelectOne { key, .. } => Self::key_value_result(
                table
                    .get(key)
                    .map(|v| vec![(key.clone(), v.clone())])
                    .unwrap_or_default(),
            ),
            Statement::Exists { key, .. } => {
                let rows = if table.contains_key(key) {
                    vec![vec![key.clone()]]
                } else {
                    Vec::new()
                };
                QueryResult::new(vec!["key".into()], rows)
            }
            Statement::Count { .. } => {
                QueryResult::new(vec!["count".into()], vec![vec![table.len().to_string()]])
            }
            Statement::Upsert { key, value, .. } => {
                table.insert(key.clone(), value.clone());
                QueryResult::affected(1)
            }
            Statement::Delete { key, .. } => {
                QueryResult::affected(u64::from(table.remove(key).is_some()))
            }
            Statement::Truncate { .. } => {
                table.clear();
                QueryResult::affected(0)
            }
        }
    }
}

#[async_trait]
impl DatabaseClient for MemoryClient {
    async fn query(&self, statement: &Statement) -> Result<QueryResult> {
        if self.is_closed() {
            return Err(MapError::Storage("attempted to acquire a connection on a closed pool".into()));
        }

        self.history.lock().await.push((
            statement.sql(),
            statement.params().into_iter().map(String::from).collect(),
        ));

        if let Some(message) = self.pending_failure.lock().await.take() {
            return Err(MapError::Storage(message));
        }

        debug!("{} on {} (memory)", statement.kind(), statement.table());

        let name = statement.table().as_str();
        let mut tables = self.tables.write().await;

        let result = match statement {
            Statement::CreateTable { .. } => {
                tables.entry(name.to_string()).or_default();
                QueryResult::affected(0)
            }
            other => {
                let table = tables.get_mut(name).ok_or_else(|| {
                    MapError::Storage(format!("relation \"{}\" does not exist", name))
                })?;
                Self::apply(table, other)
            }
        };

        Ok(result)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
