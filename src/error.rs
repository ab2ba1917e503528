//! Error types for cache construction.
//!
//! Loader failures are the loader's own error type and flow through
//! [`Cache::get`](crate::cache::Cache::get) untouched; release failures are
//! logged and dropped. The only error the cache itself produces is
//! [`ConfigError`], returned before a cache exists.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//! use flightcache::builder::CacheBuilder;
//! use flightcache::error::ConfigError;
//!
//! let built = CacheBuilder::new(0)
//!     .build(|key: &u32| Ok::<_, String>(*key));
//! let err: ConfigError = built.unwrap_err();
//! assert!(err.to_string().contains("capacity"));
//!
//! let inverted = CacheBuilder::new(8)
//!     .freshness(Duration::from_secs(10))
//!     .hard_expiry(Duration::from_secs(5))
//!     .build(|key: &u32| Ok::<_, String>(*key));
//! assert!(inverted.is_err());
//! ```

use std::fmt;

/// A cache configuration parameter was rejected.
///
/// Produced by [`CacheConfig::validate`](crate::builder::CacheConfig::validate),
/// which [`CacheBuilder::build`](crate::builder::CacheBuilder::build) runs
/// before anything is allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    field: &'static str,
    reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending `CacheConfig` field.
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn message(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid cache config `{}`: {}", self.field, self.reason)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_field() {
        let err = ConfigError::new("capacity", "must be > 0");
        assert_eq!(err.to_string(), "invalid cache config `capacity`: must be > 0");
        assert_eq!(err.field(), "capacity");
        assert_eq!(err.message(), "must be > 0");
    }

    #[test]
    fn is_a_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<ConfigError>();
    }
}
