//! Prepared statement caches.
//!
//! Each [`StatementCache`] keys prepared statements by query text and owns
//! them: a statement is closed exactly once, when the cache evicts, expires,
//! invalidates or drops it. Callers borrow a statement through
//! [`StatementHandle::with`] and the close waits for every active borrow to
//! end, so a statement is never closed under a running execution.
//!
//! ```text
//!   exec(query) ──► cache.get(query) ──► handle.with(|stmt| stmt.execute(..))
//!                        │                      │ read guard
//!                   miss: pool.prepare          │
//!                                               ▼
//!   eviction ──► release hook ──► handle.close()  write guard, take(), close
//! ```
//!
//! A handle that lost the race against its own close reports
//! [`DbError::Closed`]; the cache's helpers then fetch a fresh statement once.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{ConnectionPool, DbError, PreparedStatement, Transaction};
use crate::builder::{CacheBuilder, CacheConfig};
use crate::cache::Cache;
use crate::error::ConfigError;
use crate::metrics::CacheMetricsSnapshot;
use crate::traits::{Releasable, ReleaseError};

type Params<S> = <S as PreparedStatement>::Params;
type Row<S> = <S as PreparedStatement>::Row;

/// Shared, closable reference to a prepared statement.
pub struct StatementHandle<S> {
    inner: Arc<HandleInner<S>>,
}

struct HandleInner<S> {
    sql: Cow<'static, str>,
    // `None` once closed
    stmt: RwLock<Option<S>>,
}

impl<S> Clone for StatementHandle<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for StatementHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementHandle")
            .field("sql", &self.inner.sql)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<S> StatementHandle<S> {
    pub fn new(sql: impl Into<Cow<'static, str>>, stmt: S) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                sql: sql.into(),
                stmt: RwLock::new(Some(stmt)),
            }),
        }
    }

    pub fn sql(&self) -> &str {
        &self.inner.sql
    }

    pub fn is_closed(&self) -> bool {
        self.inner.stmt.read().is_none()
    }
}

impl<S: PreparedStatement> StatementHandle<S> {
    /// Borrows the statement for the duration of `f`.
    ///
    /// Closing the statement blocks until `f` returns. `f` must not fetch
    /// statements from the cache that owns this handle: an eviction it
    /// triggers could try to close this very statement while it is borrowed.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> Result<R, DbError>) -> Result<R, DbError> {
        let guard = self.inner.stmt.read();
        let stmt = guard.as_ref().ok_or(DbError::Closed)?;
        f(stmt)
    }

    pub fn execute(&self, params: &Params<S>) -> Result<u64, DbError> {
        self.with(|stmt| stmt.execute(params))
    }

    pub fn query(&self, params: &Params<S>) -> Result<Vec<Row<S>>, DbError> {
        self.with(|stmt| stmt.query(params))
    }

    /// Re-associates the pool-prepared statement with `tx`.
    pub fn in_tx<'a, T>(&'a self, tx: &'a T) -> TxStatement<'a, S, T>
    where
        T: Transaction<S> + ?Sized,
    {
        TxStatement { handle: self, tx }
    }

    fn close(&self) -> Result<(), DbError> {
        // waits for every outstanding `with` borrow
        let stmt = self.inner.stmt.write().take();
        match stmt {
            Some(stmt) => stmt.close(),
            None => Err(DbError::Closed),
        }
    }
}

impl<S: PreparedStatement> Releasable for StatementHandle<S> {
    fn release(&self) -> Result<(), ReleaseError> {
        self.close().map_err(Into::into)
    }
}

/// A cached statement bound to a transaction's connection.
pub struct TxStatement<'a, S, T: ?Sized> {
    handle: &'a StatementHandle<S>,
    tx: &'a T,
}

impl<S, T> TxStatement<'_, S, T>
where
    S: PreparedStatement,
    T: Transaction<S> + ?Sized,
{
    pub fn execute(&self, params: &Params<S>) -> Result<u64, DbError> {
        self.handle.with(|stmt| self.tx.execute(stmt, params))
    }

    pub fn query(&self, params: &Params<S>) -> Result<Vec<Row<S>>, DbError> {
        self.handle.with(|stmt| self.tx.query(stmt, params))
    }
}

/// Bounded cache of prepared statements for one connection pool.
pub struct StatementCache<P: ConnectionPool> {
    cache: Cache<Cow<'static, str>, StatementHandle<P::Statement>, DbError>,
}

impl<P: ConnectionPool> StatementCache<P> {
    /// Statement cache with [`CacheConfig::statements`] settings.
    pub fn new(pool: Arc<P>) -> Result<Self, ConfigError> {
        Self::with_builder(
            pool,
            CacheBuilder::from_config(CacheConfig::statements()).name("statements"),
        )
    }

    /// Uses `builder` for capacity and windows. Any release hook it carries
    /// is replaced by the statement close.
    pub fn with_builder(
        pool: Arc<P>,
        builder: CacheBuilder<StatementHandle<P::Statement>>,
    ) -> Result<Self, ConfigError> {
        let cache = builder
            .release_on_evict()
            .build(move |sql: &Cow<'static, str>| -> Result<_, DbError> {
                let stmt = pool.prepare(sql)?;
                Ok(StatementHandle::new(sql.clone(), stmt))
            })?;
        Ok(Self { cache })
    }

    /// Returns the cached statement for `sql`, preparing it on a miss.
    pub fn get(&self, sql: impl Into<Cow<'static, str>>) -> Result<StatementHandle<P::Statement>, DbError> {
        self.cache.get(&sql.into())
    }

    /// Runs `f` against the statement for `sql` on the pool.
    pub fn with_statement<R>(
        &self,
        sql: impl Into<Cow<'static, str>>,
        mut f: impl FnMut(&P::Statement) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        self.run(sql.into(), |handle| handle.with(&mut f))
    }

    pub fn exec(
        &self,
        sql: impl Into<Cow<'static, str>>,
        params: &Params<P::Statement>,
    ) -> Result<u64, DbError> {
        self.run(sql.into(), |handle| handle.execute(params))
    }

    /// First row of the result, or [`DbError::NoRows`].
    pub fn query_one(
        &self,
        sql: impl Into<Cow<'static, str>>,
        params: &Params<P::Statement>,
    ) -> Result<Row<P::Statement>, DbError> {
        first_row(self.query_all(sql, params)?)
    }

    pub fn query_all(
        &self,
        sql: impl Into<Cow<'static, str>>,
        params: &Params<P::Statement>,
    ) -> Result<Vec<Row<P::Statement>>, DbError> {
        self.run(sql.into(), |handle| handle.query(params))
    }

    pub fn tx_exec<T>(
        &self,
        tx: &T,
        sql: impl Into<Cow<'static, str>>,
        params: &Params<P::Statement>,
    ) -> Result<u64, DbError>
    where
        T: Transaction<P::Statement> + ?Sized,
    {
        self.run(sql.into(), |handle| handle.in_tx(tx).execute(params))
    }

    pub fn tx_query_one<T>(
        &self,
        tx: &T,
        sql: impl Into<Cow<'static, str>>,
        params: &Params<P::Statement>,
    ) -> Result<Row<P::Statement>, DbError>
    where
        T: Transaction<P::Statement> + ?Sized,
    {
        first_row(self.tx_query_all(tx, sql, params)?)
    }

    pub fn tx_query_all<T>(
        &self,
        tx: &T,
        sql: impl Into<Cow<'static, str>>,
        params: &Params<P::Statement>,
    ) -> Result<Vec<Row<P::Statement>>, DbError>
    where
        T: Transaction<P::Statement> + ?Sized,
    {
        self.run(sql.into(), |handle| handle.in_tx(tx).query(params))
    }

    /// Closes and forgets the statement for `sql`.
    pub fn invalidate(&self, sql: &str) -> bool {
        self.cache.invalidate(&Cow::Owned(sql.to_owned()))
    }

    /// Closes every cached statement.
    pub fn purge(&self) {
        self.cache.purge();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.cache.metrics()
    }

    pub fn cache(&self) -> &Cache<Cow<'static, str>, StatementHandle<P::Statement>, DbError> {
        &self.cache
    }

    // A handle can be closed between the lookup and its use when a concurrent
    // insert evicts it. Nothing ran in that case, so one more lookup is safe;
    // it finds the key gone and prepares a new statement.
    fn run<R>(
        &self,
        sql: Cow<'static, str>,
        mut f: impl FnMut(&StatementHandle<P::Statement>) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        let handle = self.cache.get(&sql)?;
        match f(&handle) {
            Err(DbError::Closed) => {
                debug!(cache = %self.cache.name(), sql = %sql, "statement closed before use, preparing again");
                f(&self.cache.get(&sql)?)
            },
            result => result,
        }
    }
}

impl<P: ConnectionPool> fmt::Debug for StatementCache<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementCache").field("cache", &self.cache).finish()
    }
}

fn first_row<R>(rows: Vec<R>) -> Result<R, DbError> {
    rows.into_iter().next().ok_or(DbError::NoRows)
}

/// The two statement caches of the service: one per database.
pub struct StatementCaches<A: ConnectionPool, D: ConnectionPool = A> {
    pub app: StatementCache<A>,
    pub dns: StatementCache<D>,
}

impl<A: ConnectionPool, D: ConnectionPool> StatementCaches<A, D> {
    pub fn new(app_pool: Arc<A>, dns_pool: Arc<D>) -> Result<Self, ConfigError> {
        let config = CacheConfig::statements();
        Ok(Self {
            app: StatementCache::with_builder(
                app_pool,
                CacheBuilder::from_config(config.clone()).name("app_statements"),
            )?,
            dns: StatementCache::with_builder(
                dns_pool,
                CacheBuilder::from_config(config).name("dns_statements"),
            )?,
        })
    }

    /// Closes every statement in both caches.
    pub fn close_all(&self) {
        self.app.purge();
        self.dns.purge();
    }
}

impl<A: ConnectionPool, D: ConnectionPool> fmt::Debug for StatementCaches<A, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementCaches")
            .field("app", &self.app)
            .field("dns", &self.dns)
            .finish()
    }
}
