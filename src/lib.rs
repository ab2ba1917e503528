//! flightcache: expiring single-flight caches with bounded 2Q eviction.
//!
//! [`Cache`](cache::Cache) is the engine; [`db`] and [`tags`] build the
//! service's statement and reference-data caches on top of it.

pub mod builder;
pub mod cache;
pub mod clock;
pub mod db;
pub mod ds;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod prelude;
pub mod tags;
pub mod traits;
