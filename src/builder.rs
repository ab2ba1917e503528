//! Cache configuration and builder.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use flightcache::builder::CacheBuilder;
//! use flightcache::policy::PolicyKind;
//!
//! let cache = CacheBuilder::new(150)
//!     .name("tags_by_id")
//!     .freshness(Duration::from_secs(60))
//!     .hard_expiry(Duration::from_secs(60))
//!     .policy(PolicyKind::TwoQueue)
//!     .build(|id: &i64| Ok::<_, String>(format!("tag-{id}")))
//!     .unwrap();
//!
//! assert_eq!(cache.get(&7).unwrap(), "tag-7");
//! ```

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, ReleaseHook};
use crate::clock::{Clock, SystemClock};
use crate::error::ConfigError;
use crate::policy::PolicyKind;
use crate::traits::{Loader, Releasable, ReleaseError};

/// Construction-time cache parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum resident keys.
    pub capacity: usize,
    /// Age below which a value is served without any reload.
    pub freshness: Duration,
    /// Age at which a value must be reloaded synchronously.
    pub hard_expiry: Duration,
    pub policy: PolicyKind,
    /// Period of the background sweep that drops hard-expired entries.
    /// `None` leaves expired entries in place until touched or evicted.
    pub cleanup_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            freshness: Duration::from_secs(60),
            hard_expiry: Duration::from_secs(60),
            policy: PolicyKind::TwoQueue,
            cleanup_interval: None,
        }
    }
}

impl CacheConfig {
    /// Prepared statements: query text is static, so both windows are long and
    /// equal and the cache acts as a bounded pool. Expired handles are swept
    /// every window so idle statements are closed without further traffic.
    pub fn statements() -> Self {
        Self {
            capacity: 256,
            freshness: Duration::from_secs(90),
            hard_expiry: Duration::from_secs(90),
            cleanup_interval: Some(Duration::from_secs(90)),
            ..Self::default()
        }
    }

    /// Read-mostly reference rows, tolerating about a minute of staleness.
    pub fn reference_data(capacity: usize) -> Self {
        Self {
            capacity,
            freshness: Duration::from_secs(60),
            hard_expiry: Duration::from_secs(60),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::new("capacity", "must be > 0"));
        }
        if self.freshness.is_zero() {
            return Err(ConfigError::new("freshness", "must be > 0"));
        }
        if self.freshness > self.hard_expiry {
            return Err(ConfigError::new(
                "freshness",
                format!("{:?} exceeds hard expiry of {:?}", self.freshness, self.hard_expiry),
            ));
        }
        if matches!(self.cleanup_interval, Some(interval) if interval.is_zero()) {
            return Err(ConfigError::new("cleanup_interval", "must be > 0"));
        }
        Ok(())
    }
}

/// Builder for [`Cache`] instances.
///
/// `V` is normally inferred from the loader passed to [`build`](Self::build).
pub struct CacheBuilder<V> {
    config: CacheConfig,
    name: Cow<'static, str>,
    clock: Arc<dyn Clock>,
    release: Option<ReleaseHook<V>>,
    _value: PhantomData<fn() -> V>,
}

impl<V> CacheBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Starts from [`CacheConfig::default`] with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self::from_config(CacheConfig {
            capacity,
            ..CacheConfig::default()
        })
    }

    pub fn from_config(config: CacheConfig) -> Self {
        Self {
            config,
            name: Cow::Borrowed("cache"),
            clock: Arc::new(SystemClock),
            release: None,
            _value: PhantomData,
        }
    }

    /// Name used in log events and refresh thread names.
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn freshness(mut self, freshness: Duration) -> Self {
        self.config.freshness = freshness;
        self
    }

    pub fn hard_expiry(mut self, hard_expiry: Duration) -> Self {
        self.config.hard_expiry = hard_expiry;
        self
    }

    /// Sets freshness and hard expiry to the same window.
    pub fn ttl(self, ttl: Duration) -> Self {
        self.freshness(ttl).hard_expiry(ttl)
    }

    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = Some(interval);
        self
    }

    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Runs `hook` exactly once for every value that leaves the cache.
    pub fn on_release<F>(mut self, hook: F) -> Self
    where
        F: Fn(&V) -> Result<(), ReleaseError> + Send + Sync + 'static,
    {
        let hook: ReleaseHook<V> = Arc::new(hook);
        self.release = Some(hook);
        self
    }

    /// Releases values through their [`Releasable`] impl when they leave the cache.
    pub fn release_on_evict(self) -> Self
    where
        V: Releasable,
    {
        self.on_release(|value: &V| value.release())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Validates the configuration and creates the cache.
    pub fn build<K, E, L>(self, loader: L) -> Result<Cache<K, V, E>, ConfigError>
    where
        K: Clone + Eq + std::hash::Hash + Send + Sync + 'static,
        E: Clone + Send + std::fmt::Debug + 'static,
        L: Loader<K, V, E>,
    {
        self.config.validate()?;
        Ok(Cache::from_parts(
            self.config,
            self.name,
            Box::new(loader),
            self.clock,
            self.release,
        ))
    }
}
