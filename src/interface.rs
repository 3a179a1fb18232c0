use async_trait::async_trait;

use crate::core::Result;
use crate::result::QueryResult;
use crate::schema::Statement;

/// The storage client a persistent collection talks to.
///
/// `PgClient` is the production implementation over a PostgreSQL pool;
/// `MemoryClient` honors the same statement contract in-process and is what
/// the tests run against. Failures surface as `MapError::Storage` and are
/// never retried.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Execute a statement. Selects return rows; writes report `rows_affected`.
    async fn query(&self, statement: &Statement) -> Result<QueryResult>;

    /// Release pooled connections. Statements issued afterwards fail.
    async fn close(&self);
}
