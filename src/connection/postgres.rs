use async_trait::async_trait;
use log::debug;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::config::{ConnectionConfig, ConnectionTarget};
use crate::core::{MapError, Result};
use crate::interface::DatabaseClient;
use crate::result::QueryResult;
use crate::schema::Statement;

/// PostgreSQL client backed by a `sqlx` connection pool.
#[derive(Clone)]
pub struct PgClient {
    pool: PgPool,
}

impl PgClient {
    /// Build a pool for the configured server.
    ///
    /// No connection is opened here; the pool connects on the first
    /// statement. The pool's maintenance tasks need a Tokio runtime, so
    /// calling this outside one fails with `MapError::Configuration`.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = connect_options(config)?;
        tokio::runtime::Handle::try_current().map_err(|e| {
            MapError::Configuration(format!("a Tokio runtime is required to build the pool: {}", e))
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .connect_lazy_with(options);

        debug!("Created lazy pool for {}", config.to_url());
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseClient for PgClient {
    async fn query(&self, statement: &Statement) -> Result<QueryResult> {
        let sql = statement.sql();
        debug!("{} on {}: {}", statement.kind(), statement.table(), sql);

        let mut query = sqlx::query(&sql);
        for param in statement.params() {
            query = query.bind(param.to_string());
        }

        match statement {
            Statement::SelectAll { .. } | Statement::SelectOne { .. } => {
                let rows = query.fetch_all(&self.pool).await?;
                let rows = rows
                    .iter()
                    .map(|row| Ok(vec![text_column(row, "key")?, text_column(row, "value")?]))
                    .collect::<Result<Vec<_>>>()?;
                Ok(QueryResult::new(vec!["key".into(), "value".into()], rows))
            }
            Statement::Exists { .. } => {
                let rows = query.fetch_all(&self.pool).await?;
                let rows = rows
                    .iter()
                    .map(|row| Ok(vec![text_column(row, "key")?]))
                    .collect::<Result<Vec<_>>>()?;
                Ok(QueryResult::new(vec!["key".into()], rows))
            }
            Statement::Count { .. } => {
                let row = query.fetch_one(&self.pool).await?;
                let count: i64 = row.try_get("count")?;
                Ok(QueryResult::new(vec!["count".into()], vec![vec![count.to_string()]]))
            }
            Statement::CreateTable { .. }
            | Statement::Upsert { .. }
            | Statement::Delete { .. }
            | Statement::Truncate { .. } => {
                let done = query.execute(&self.pool).await?;
                Ok(QueryResult::affected(done.rows_affected()))
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Translate a validated config into driver options.
fn connect_options(config: &ConnectionConfig) -> Result<PgConnectOptions> {
    config.validate()?;

    match &config.target {
        ConnectionTarget::Url(url) => url
            .parse::<PgConnectOptions>()
            .map_err(|e| MapError::Configuration(format!("invalid connection string: {}", e))),
        ConnectionTarget::Params {
            user,
            password,
            host,
            port,
            database,
        } => Ok(PgConnectOptions::new()
            .host(host)
            .port(*port)
            .username(user)
            .password(password)
            .database(database)),
    }
}

fn text_column(row: &PgRow, column: &str) -> Result<String> {
    Ok(row.try_get::<String, _>(column)?)
}
