//! Persistent collection engine
//!
//! `PersistentMap` keeps one table in step with an in-memory collection.
//! `init` bootstraps the table and, for eager collections, copies every row
//! into the caller's collection. After that, mutations are written through to
//! the table one statement at a time.
//!
//! Nothing here locks: concurrent writes to the same key race at the server
//! and the last acknowledged upsert wins.

use futures::future::try_join_all;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::readiness::{Readiness, StateCell, SyncState};
use crate::codec;
use crate::collection::Collection;
use crate::connection::{ConnectionConfig, PgClient};
use crate::core::{IntoKey, MapError, Result, Value};
use crate::interface::DatabaseClient;
use crate::schema::{Statement, TableName};

/// How a collection is populated on `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hydration {
    /// Copy every row into the collection; the table is then only a
    /// durability log.
    #[default]
    Eager,
    /// Leave the collection empty; values are fetched per key and the table
    /// stays the source of truth.
    Lazy,
}

/// A key/value collection persisted to a two-column table.
pub struct PersistentMap {
    table: TableName,
    hydration: Hydration,
    client: Arc<dyn DatabaseClient>,
    state: StateCell,
}

impl PersistentMap {
    /// Create a collection backed by PostgreSQL.
    ///
    /// Fails with `MapError::Configuration` when the name or the connection
    /// parameters are missing, or when called outside a Tokio runtime. No
    /// connection is opened until `init`.
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        let client = PgClient::connect(&config)?;
        Self::with_client(&config.name, config.hydration, Arc::new(client))
    }

    /// Create a collection on top of an existing client.
    pub fn with_client(
        name: &str,
        hydration: Hydration,
        client: Arc<dyn DatabaseClient>,
    ) -> Result<Self> {
        let table = TableName::sanitize(name)?;
        debug!("Collection '{}' mapped to table {} ({:?})", name, table, hydration);
        Ok(Self {
            table,
            hydration,
            client,
            state: StateCell::new(),
        })
    }

    /// Sanitized collection name, which is also the table name.
    pub fn name(&self) -> &str {
        self.table.as_str()
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn hydration(&self) -> Hydration {
        self.hydration
    }

    pub fn state(&self) -> SyncState {
        self.state.get()
    }

    pub fn readiness(&self) -> Readiness {
        self.state.subscribe()
    }

    // ========================================================================
    // Synchronization
    // ========================================================================

    /// Create the backing table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.client
            .query(&Statement::CreateTable {
                table: self.table.clone(),
            })
            .await?;
        Ok(())
    }

    /// Bootstrap the table and, for eager collections, load every row into
    /// `collection`.
    ///
    /// The returned handle is already ready. Calling `init` again re-runs the
    /// bootstrap and the eager load.
    pub async fn init<C: Collection + ?Sized>(&self, collection: &mut C) -> Result<Readiness> {
        self.ensure_schema().await?;
        self.transition(SyncState::SchemaReady);

        if self.hydration == Hydration::Eager {
            self.transition(SyncState::Hydrating);
            let loaded = self.load_rows(collection).await?;
            info!("{} rows loaded into {}.", loaded, self.table);
        }

        self.transition(SyncState::Ready);
        Ok(self.readiness())
    }

    /// Look up one key in the table. `None` means the key is absent.
    ///
    /// The value is not inserted into any collection; caching it is up to
    /// the caller.
    pub async fn fetch(&self, key: impl IntoKey) -> Result<Option<Value>> {
        let key = key.into_key()?;
        self.ensure_ready()?;

        let result = self
            .client
            .query(&Statement::SelectOne {
                table: self.table.clone(),
                key: key.into_string(),
            })
            .await?;

        match result.pairs().next() {
            Some((_, text)) => codec::decode(text).map(Some),
            None => Ok(None),
        }
    }

    /// Re-read every row into `collection`. Returns the number of rows applied.
    pub async fn fetch_all<C: Collection + ?Sized>(&self, collection: &mut C) -> Result<usize> {
        self.ensure_ready()?;
        self.load_rows(collection).await
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Write a value without waiting for the server.
    ///
    /// Key validation and encoding happen before this returns; the upsert
    /// itself runs on a spawned task whose failure is only logged. Await the
    /// returned handle to know when the write has finished.
    pub fn set(&self, key: impl IntoKey, value: impl Into<Value>) -> Result<JoinHandle<()>> {
        let statement = self.upsert(key, value.into())?;
        self.detach(statement)
    }

    /// Write a value and wait for the server to acknowledge it.
    pub async fn set_async(&self, key: impl IntoKey, value: impl Into<Value>) -> Result<()> {
        let statement = self.upsert(key, value.into())?;
        self.client.query(&statement).await?;
        Ok(())
    }

    /// Delete a key without waiting for the server. Missing keys are fine.
    pub fn delete(&self, key: impl IntoKey) -> Result<JoinHandle<()>> {
        let statement = self.delete_statement(key)?;
        self.detach(statement)
    }

    /// Delete a key and wait for the server. Missing keys are fine.
    pub async fn delete_async(&self, key: impl IntoKey) -> Result<()> {
        let statement = self.delete_statement(key)?;
        self.client.query(&statement).await?;
        Ok(())
    }

    /// Remove every row. Irreversible.
    pub async fn bulk_delete(&self) -> Result<()> {
        self.ensure_ready()?;
        self.client
            .query(&Statement::Truncate {
                table: self.table.clone(),
            })
            .await?;
        info!("Truncated {}", self.table);
        Ok(())
    }

    /// Whether a key exists in the table, without reading its value.
    pub async fn has(&self, key: impl IntoKey) -> Result<bool> {
        let key = key.into_key()?;
        self.ensure_ready()?;

        let result = self
            .client
            .query(&Statement::Exists {
                table: self.table.clone(),
                key: key.into_string(),
            })
            .await?;
        Ok(!result.is_empty())
    }

    /// Number of rows in the table.
    pub async fn count(&self) -> Result<u64> {
        self.ensure_ready()?;

        let result = self
            .client
            .query(&Statement::Count {
                table: self.table.clone(),
            })
            .await?;

        result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|count| count.parse().ok())
            .ok_or_else(|| MapError::Storage(format!("COUNT on {} returned no number", self.table)))
    }

    /// Write every entry of `collection` through to the table.
    ///
    /// All keys are validated before the first statement is sent. Writes are
    /// issued concurrently and the first failure is returned.
    pub async fn persist_all<C: Collection + ?Sized>(&self, collection: &C) -> Result<usize> {
        self.ensure_ready()?;

        let statements = collection
            .entries()
            .map(|(key, value)| {
                Ok(Statement::Upsert {
                    table: self.table.clone(),
                    key: key.into_key()?.into_string(),
                    value: codec::encode(value),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        try_join_all(statements.iter().map(|s| self.client.query(s))).await?;
        debug!("Persisted {} entries to {}", statements.len(), self.table);
        Ok(statements.len())
    }

    /// Release the pool. Later operations fail with a storage error.
    pub async fn close(&self) {
        self.client.close().await;
        info!("Closed connections for {}", self.table);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn transition(&self, next: SyncState) {
        if self.state.advance(next) {
            debug!("{} -> {}", self.table, next);
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state.get() == SyncState::Ready {
            Ok(())
        } else {
            Err(MapError::NotReady(format!(
                "collection '{}' has not completed init()",
                self.table
            )))
        }
    }

    fn upsert(&self, key: impl IntoKey, value: Value) -> Result<Statement> {
        let key = key.into_key()?;
        self.ensure_ready()?;
        Ok(Statement::Upsert {
            table: self.table.clone(),
            key: key.into_string(),
            value: codec::encode(&value),
        })
    }

    fn delete_statement(&self, key: impl IntoKey) -> Result<Statement> {
        let key = key.into_key()?;
        self.ensure_ready()?;
        Ok(Statement::Delete {
            table: self.table.clone(),
            key: key.into_string(),
        })
    }

    fn detach(&self, statement: Statement) -> Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MapError::Storage(format!("no runtime for detached write: {}", e)))?;
        let client = Arc::clone(&self.client);

        Ok(runtime.spawn(async move {
            if let Err(e) = client.query(&statement).await {
                error!(
                    "Detached {} on {} failed: {}",
                    statement.kind(),
                    statement.table(),
                    e
                );
            }
        }))
    }

    async fn load_rows<C: Collection + ?Sized>(&self, collection: &mut C) -> Result<usize> {
        let result = self
            .client
            .query(&Statement::SelectAll {
                table: self.table.clone(),
            })
            .await?;

        let mut loaded = 0;
        for (key, text) in result.pairs() {
            let value = codec::decode(text)
                .map_err(|e| MapError::Codec(format!("row '{}' in {}: {}", key, self.table, e)))?;
            collection.set(key.to_string(), value);
            loaded += 1;
        }
        Ok(loaded)
    }
}
