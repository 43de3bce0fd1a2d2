use std::{any::TypeId, sync::Arc};

use dashmap::DashMap;
use tracing::trace;

use crate::error::Result;

/// Identifies one statement shape of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    entity: TypeId,
    fingerprint: String,
}

impl CacheKey {
    #[must_use]
    pub fn new<T: 'static>(fingerprint: impl Into<String>) -> Self {
        Self {
            entity: TypeId::of::<T>(),
            fingerprint: fingerprint.into(),
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// A built statement, along with the positions in [`Entity::FIELDS`](crate::entity::Entity)
/// of the fields bound to its placeholders (`inputs`) and of the fields it reads back
/// (`outputs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub sql: String,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    /// The number of placeholders in `sql`. Statements binding values beyond the entity's own
    /// fields (e.g. bulk updates) expect more than `inputs.len()`.
    pub placeholders: usize,
}

/// Built statements, keyed by entity type and statement shape. Entries are never evicted.
#[derive(Debug, Default)]
pub struct StatementCache {
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
}

impl StatementCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for `key`, building and storing it on a miss.
    ///
    /// `build` runs without holding any lock, so concurrent first callers may each build the
    /// entry; the last one stored wins. `build` must only depend on the key.
    ///
    /// # Errors
    ///
    /// Whatever `build` returns. Nothing is stored in that case.
    pub fn get_or_build<F>(&self, key: CacheKey, build: F) -> Result<Arc<CacheEntry>>
    where
        F: FnOnce() -> Result<CacheEntry>,
    {
        if let Some(entry) = self.entries.get(&key) {
            trace!(fingerprint = key.fingerprint(), "statement cache hit");
            return Ok(Arc::clone(entry.value()));
        }

        trace!(fingerprint = key.fingerprint(), "statement cache miss");

        let entry = Arc::new(build()?);
        self.entries.insert(key, Arc::clone(&entry));

        Ok(entry)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::Arc,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::{CacheEntry, CacheKey, StatementCache};
    use crate::{
        entity::test::{post::Post, writer::Writer},
        error::{Error, Operation},
    };

    fn entry(sql: &str) -> CacheEntry {
        CacheEntry {
            sql: sql.to_string(),
            inputs: vec![1, 2],
            outputs: vec![0],
            placeholders: 2,
        }
    }

    #[test]
    fn test_build_runs_once_per_key() {
        let cache = StatementCache::new();
        let builds = AtomicUsize::new(0);

        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(entry("INSERT"))
        };

        let first = cache
            .get_or_build(CacheKey::new::<Writer>("insert.infer."), build)
            .unwrap();
        let second = cache
            .get_or_build(CacheKey::new::<Writer>("insert.infer."), build)
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_are_scoped_by_entity() {
        let cache = StatementCache::new();

        cache
            .get_or_build(CacheKey::new::<Writer>("delete"), || Ok(entry("a")))
            .unwrap();
        let post = cache
            .get_or_build(CacheKey::new::<Post>("delete"), || Ok(entry("b")))
            .unwrap();

        assert_eq!(post.sql, "b");
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_callers_share_one_entry() {
        let cache = Arc::new(StatementCache::new());

        let handles = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| {
                            cache
                                .get_or_build(CacheKey::new::<Post>("update.infer"), || {
                                    Ok(entry("UPDATE \"post\""))
                                })
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            for found in handle.join().unwrap() {
                assert_eq!(found.sql, "UPDATE \"post\"");
                assert_eq!(found.inputs, vec![1, 2]);
            }
        }

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_build_is_not_stored() {
        let cache = StatementCache::new();

        let result = cache.get_or_build(CacheKey::new::<Writer>("update"), || {
            Err(Error::EmptyColumnSet {
                table: "writer",
                operation: Operation::Update,
            })
        });

        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
