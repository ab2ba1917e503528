pub use crate::builder::{CacheBuilder, CacheConfig};
pub use crate::cache::{Cache, EntryState, ReleaseHook};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::db::{
    ConnectionPool, DbError, PreparedStatement, StatementCache, StatementCaches, StatementHandle,
    Transaction, TxStatement,
};
pub use crate::error::ConfigError;
pub use crate::metrics::CacheMetricsSnapshot;
pub use crate::policy::{LruPolicy, PolicyKind, TwoQueuePolicy};
#[cfg(feature = "sqlite")]
pub use crate::tags::SqliteTagSource;
pub use crate::tags::{Tag, TagCaches, TagSource};
pub use crate::traits::{EvictionPolicy, Loader, Releasable, ReleaseError};
