//! The execution collaborator: run one parameterized statement, return rows.

use crate::error::{OrmError, OrmResult};
use crate::value::{RowMap, Value, row_to_map};
use std::future::Future;
use tokio_postgres::types::ToSql;

/// Runs a complete statement and returns its rows.
///
/// `Ok(None)` is the "no result set" signal; builders pass it through to
/// their callers. Errors are returned unchanged and never retried.
///
/// Implemented for `tokio_postgres` clients and transactions and, with the
/// `pool` feature, for `deadpool_postgres` pools (acquire, run, release).
pub trait Executor: Send + Sync {
    /// Execute `sql` with positional `params` (`$1` is `params[0]`).
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Option<Vec<RowMap>>>> + Send;
}

impl<E: Executor> Executor for &E {
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = OrmResult<Option<Vec<RowMap>>>> + Send {
        (**self).query(sql, params)
    }
}

fn param_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl Executor for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Option<Vec<RowMap>>> {
        let rows = tokio_postgres::Client::query(self, sql, &param_refs(params))
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Some(rows.iter().map(row_to_map).collect()))
    }
}

impl Executor for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Option<Vec<RowMap>>> {
        let rows = tokio_postgres::Transaction::query(self, sql, &param_refs(params))
            .await
            .map_err(OrmError::from_db_error)?;
        Ok(Some(rows.iter().map(row_to_map).collect()))
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Option<Vec<RowMap>>> {
        let client: &tokio_postgres::Client = self;
        Executor::query(client, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Pool {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Option<Vec<RowMap>>> {
        // The pooled connection goes back to the pool when `client` drops.
        let client = self.get().await?;
        Executor::query(&client, sql, params).await
    }
}

/// Executor backed by the process-wide pool (see [`crate::pool::configure_db`]).
#[cfg(feature = "pool")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SharedPool;

#[cfg(feature = "pool")]
impl Executor for SharedPool {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Option<Vec<RowMap>>> {
        let pool = crate::pool::shared_pool()?;
        Executor::query(&pool, sql, params).await
    }
}
