//! Database-facing contracts and the prepared statement caches.
//!
//! The cache never talks to a driver directly. A driver adapter implements
//! [`ConnectionPool`] (prepare against the shared pool), [`PreparedStatement`]
//! (run and close one prepared query) and, for transactional use,
//! [`Transaction`] (run a pool-prepared statement on the transaction's own
//! connection).

pub mod statement;

pub use statement::{StatementCache, StatementCaches, StatementHandle, TxStatement};

/// Errors surfaced by database collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    #[error("database unavailable: {0}")]
    Unavailable(String),
    #[error("connection pool exhausted")]
    PoolExhausted,
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("statement already closed")]
    Closed,
    #[error("no rows in result set")]
    NoRows,
    #[error("database error: {0}")]
    Query(String),
}

/// Shared pool able to prepare statements.
pub trait ConnectionPool: Send + Sync + 'static {
    type Statement: PreparedStatement;

    fn prepare(&self, query: &str) -> Result<Self::Statement, DbError>;
}

/// A prepared query bound to the pool.
///
/// Implementations must allow concurrent `execute`/`query` calls from several
/// threads; the handle only serializes them against `close`.
pub trait PreparedStatement: Send + Sync + 'static {
    type Params: ?Sized;
    type Row;

    /// Runs the statement, returning the number of affected rows.
    fn execute(&self, params: &Self::Params) -> Result<u64, DbError>;

    fn query(&self, params: &Self::Params) -> Result<Vec<Self::Row>, DbError>;

    fn close(self) -> Result<(), DbError>;
}

/// An open transaction that can run statements prepared on the pool.
pub trait Transaction<S: PreparedStatement> {
    fn execute(&self, stmt: &S, params: &S::Params) -> Result<u64, DbError>;

    fn query(&self, stmt: &S, params: &S::Params) -> Result<Vec<S::Row>, DbError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory driver used by the statement cache tests.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{ConnectionPool, DbError, PreparedStatement, Transaction};

    #[derive(Debug, Default)]
    pub struct Counters {
        pub prepared: AtomicUsize,
        pub closed: AtomicUsize,
        pub executions: AtomicUsize,
        pub events: Mutex<Vec<String>>,
    }

    #[derive(Debug, Default)]
    pub struct MockPool {
        pub counters: Arc<Counters>,
        pub down: AtomicBool,
        pub fail_close: AtomicBool,
    }

    impl MockPool {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[derive(Debug)]
    pub struct MockStatement {
        pub query: String,
        counters: Arc<Counters>,
        fail_close: bool,
    }

    impl ConnectionPool for MockPool {
        type Statement = MockStatement;

        fn prepare(&self, query: &str) -> Result<MockStatement, DbError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(DbError::Unavailable("connection refused".into()));
            }
            if !query.starts_with("SELECT") && !query.starts_with("INSERT") {
                return Err(DbError::InvalidQuery(query.to_string()));
            }
            self.counters.prepared.fetch_add(1, Ordering::SeqCst);
            Ok(MockStatement {
                query: query.to_string(),
                counters: Arc::clone(&self.counters),
                fail_close: self.fail_close.load(Ordering::SeqCst),
            })
        }
    }

    impl PreparedStatement for MockStatement {
        type Params = [i64];
        type Row = i64;

        fn execute(&self, params: &[i64]) -> Result<u64, DbError> {
            self.counters.executions.fetch_add(1, Ordering::SeqCst);
            Ok(params.len() as u64)
        }

        fn query(&self, params: &[i64]) -> Result<Vec<i64>, DbError> {
            self.counters.executions.fetch_add(1, Ordering::SeqCst);
            Ok(params.to_vec())
        }

        fn close(self) -> Result<(), DbError> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            self.counters.events.lock().push(format!("close {}", self.query));
            if self.fail_close {
                return Err(DbError::Query("bad connection".into()));
            }
            Ok(())
        }
    }

    /// Transaction that tags every row with its id so tests can tell the
    /// transactional path from the pool path.
    #[derive(Debug)]
    pub struct MockTx {
        pub id: i64,
        pub statements: Mutex<Vec<String>>,
    }

    impl MockTx {
        pub fn new(id: i64) -> Self {
            Self {
                id,
                statements: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transaction<MockStatement> for MockTx {
        fn execute(&self, stmt: &MockStatement, params: &[i64]) -> Result<u64, DbError> {
            self.statements.lock().push(stmt.query.clone());
            stmt.execute(params)
        }

        fn query(&self, stmt: &MockStatement, params: &[i64]) -> Result<Vec<i64>, DbError> {
            self.statements.lock().push(stmt.query.clone());
            Ok(stmt.query(params)?.into_iter().map(|row| row + self.id).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_error_messages() {
        assert_eq!(DbError::PoolExhausted.to_string(), "connection pool exhausted");
        assert_eq!(
            DbError::InvalidQuery("SELEC 1".into()).to_string(),
            "invalid query: SELEC 1"
        );
        assert_eq!(DbError::Closed.to_string(), "statement already closed");
    }
}
