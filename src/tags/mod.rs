//! Reference-data caches for tags.
//!
//! Tags change rarely and are read on nearly every request, so three caches
//! sit in front of the [`TagSource`]: one keyed by name, one keyed by id and
//! a single-slot cache holding the whole table. Values are `Arc`-shared and
//! immutable; nothing needs releasing when they leave the cache.

#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use crate::builder::{CacheBuilder, CacheConfig};
use crate::cache::Cache;
use crate::clock::{Clock, SystemClock};
use crate::db::DbError;
use crate::error::ConfigError;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteTagSource;

const TAG_CAPACITY: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// Backing store for tags. A missing tag is [`DbError::NoRows`].
pub trait TagSource: Send + Sync + 'static {
    fn tag_by_name(&self, name: &str) -> Result<Tag, DbError>;

    fn tag_by_id(&self, id: i64) -> Result<Tag, DbError>;

    fn all_tags(&self) -> Result<Vec<Tag>, DbError>;
}

/// The three tag caches.
pub struct TagCaches {
    by_name: Cache<String, Arc<Tag>, DbError>,
    by_id: Cache<i64, Arc<Tag>, DbError>,
    all: Cache<(), Arc<Vec<Tag>>, DbError>,
}

impl TagCaches {
    pub fn new<S: TagSource>(source: Arc<S>) -> Result<Self, ConfigError> {
        Self::with_clock(source, SystemClock)
    }

    pub fn with_clock<S, C>(source: Arc<S>, clock: C) -> Result<Self, ConfigError>
    where
        S: TagSource,
        C: Clock + Clone,
    {
        let by_name = {
            let source = Arc::clone(&source);
            CacheBuilder::from_config(CacheConfig::reference_data(TAG_CAPACITY))
                .name("tags_by_name")
                .clock(clock.clone())
                .build(move |name: &String| source.tag_by_name(name).map(Arc::new))?
        };
        let by_id = {
            let source = Arc::clone(&source);
            CacheBuilder::from_config(CacheConfig::reference_data(TAG_CAPACITY))
                .name("tags_by_id")
                .clock(clock.clone())
                .build(move |id: &i64| source.tag_by_id(*id).map(Arc::new))?
        };
        let all = CacheBuilder::from_config(CacheConfig::reference_data(1))
            .name("tags")
            .clock(clock)
            .build(move |_: &()| source.all_tags().map(Arc::new))?;
        Ok(Self { by_name, by_id, all })
    }

    pub fn by_name(&self, name: &str) -> Result<Arc<Tag>, DbError> {
        self.by_name.get(&name.to_owned())
    }

    pub fn by_id(&self, id: i64) -> Result<Arc<Tag>, DbError> {
        self.by_id.get(&id)
    }

    pub fn all(&self) -> Result<Arc<Vec<Tag>>, DbError> {
        self.all.get(&())
    }

    /// Forgets everything; the next lookups reload from the source.
    pub fn purge(&self) {
        self.by_name.purge();
        self.by_id.purge();
        self.all.purge();
    }

    pub fn by_name_cache(&self) -> &Cache<String, Arc<Tag>, DbError> {
        &self.by_name
    }

    pub fn by_id_cache(&self) -> &Cache<i64, Arc<Tag>, DbError> {
        &self.by_id
    }

    pub fn all_cache(&self) -> &Cache<(), Arc<Vec<Tag>>, DbError> {
        &self.all
    }
}

impl std::fmt::Debug for TagCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagCaches")
            .field("by_name", &self.by_name)
            .field("by_id", &self.by_id)
            .field("all", &self.all)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct StaticTags {
        lookups: AtomicUsize,
    }

    impl StaticTags {
        const TAGS: [(i64, &'static str); 3] = [(1, "rust"), (2, "go"), (3, "zig")];
    }

    impl TagSource for StaticTags {
        fn tag_by_name(&self, name: &str) -> Result<Tag, DbError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Self::TAGS
                .iter()
                .find(|(_, tag)| *tag == name)
                .map(|&(id, name)| Tag { id, name: name.to_string() })
                .ok_or(DbError::NoRows)
        }

        fn tag_by_id(&self, id: i64) -> Result<Tag, DbError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Self::TAGS
                .iter()
                .find(|(tag_id, _)| *tag_id == id)
                .map(|&(id, name)| Tag { id, name: name.to_string() })
                .ok_or(DbError::NoRows)
        }

        fn all_tags(&self) -> Result<Vec<Tag>, DbError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(Self::TAGS
                .iter()
                .map(|&(id, name)| Tag { id, name: name.to_string() })
                .collect())
        }
    }

    #[test]
    fn lookups_hit_source_once_per_minute() {
        let source = Arc::new(StaticTags::default());
        let clock = ManualClock::new();
        let tags = TagCaches::with_clock(Arc::clone(&source), clock.clone()).unwrap();

        assert_eq!(tags.by_name("rust").unwrap().id, 1);
        assert_eq!(tags.by_id(2).unwrap().name, "go");
        assert_eq!(tags.all().unwrap().len(), 3);
        assert_eq!(source.lookups.load(Ordering::SeqCst), 3);

        clock.advance(Duration::from_secs(59));
        tags.by_name("rust").unwrap();
        tags.by_id(2).unwrap();
        tags.all().unwrap();
        assert_eq!(source.lookups.load(Ordering::SeqCst), 3);

        clock.advance(Duration::from_secs(1));
        tags.all().unwrap();
        assert_eq!(source.lookups.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn missing_tag_is_not_cached() {
        let source = Arc::new(StaticTags::default());
        let tags = TagCaches::new(Arc::clone(&source)).unwrap();

        assert_eq!(tags.by_name("cobol"), Err(DbError::NoRows));
        assert_eq!(tags.by_name("cobol"), Err(DbError::NoRows));
        assert_eq!(source.lookups.load(Ordering::SeqCst), 2);
        assert!(tags.by_name_cache().is_empty());
    }

    #[test]
    fn cache_shapes() {
        let tags = TagCaches::new(Arc::new(StaticTags::default())).unwrap();
        assert_eq!(tags.by_name_cache().capacity(), 150);
        assert_eq!(tags.by_id_cache().capacity(), 150);
        assert_eq!(tags.all_cache().capacity(), 1);
        assert_eq!(tags.by_id_cache().config().hard_expiry, Duration::from_secs(60));

        tags.by_id(1).unwrap();
        tags.purge();
        assert!(tags.by_id_cache().is_empty());
    }
}
