//! Query Executor Module
//!
//! The capability handed to caller-supplied query layers. The adapter never
//! issues domain queries itself; it builds the caller's query handle from a
//! pool that implements [`PgExecutor`].

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use crate::error::Result;

/// Statement parameters, as accepted by `tokio_postgres`.
pub type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

/// Executes statements against PostgreSQL.
#[async_trait]
pub trait PgExecutor: Send + Sync {
    /// Runs a statement, returning the number of affected rows.
    async fn exec(&self, sql: &str, params: Params<'_>) -> Result<u64>;

    /// Runs a query returning any number of rows.
    async fn query(&self, sql: &str, params: Params<'_>) -> Result<Vec<Row>>;

    /// Runs a query that must return exactly one row.
    async fn query_row(&self, sql: &str, params: Params<'_>) -> Result<Row>;
}

#[async_trait]
impl PgExecutor for Pool {
    async fn exec(&self, sql: &str, params: Params<'_>) -> Result<u64> {
        let client = self.get().await?;
        Ok(client.execute(sql, params).await?)
    }

    async fn query(&self, sql: &str, params: Params<'_>) -> Result<Vec<Row>> {
        let client = self.get().await?;
        Ok(client.query(sql, params).await?)
    }

    async fn query_row(&self, sql: &str, params: Params<'_>) -> Result<Row> {
        let client = self.get().await?;
        Ok(client.query_one(sql, params).await?)
    }
}
