// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Append-only cache of native state objects keyed by packed state.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// Hit/miss counters of a [`StateCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that created a new object.
    pub misses: u64,
}

/// Maps a packed key to the single native object created for it.
///
/// Equal keys always return the same `Arc` (pointer-equal). Entries are never
/// evicted; [`StateCache::drain`] releases them all at driver teardown.
pub struct StateCache<K, V> {
    entries: HashMap<K, Arc<V>>,
    stats: CacheStats,
}

impl<K: Copy + Eq + Hash, V> StateCache<K, V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Returns the object cached for `key`, creating it with `create` on a miss.
    ///
    /// A failed creation caches nothing.
    pub fn get_or_create<E>(
        &mut self,
        key: K,
        create: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(existing) = self.entries.get(&key) {
            self.stats.hits += 1;
            return Ok(existing.clone());
        }
        let created = Arc::new(create()?);
        self.stats.misses += 1;
        self.entries.insert(key, created.clone());
        Ok(created)
    }

    /// Returns the object cached for `key` without creating one.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.entries.get(key).cloned()
    }

    /// Number of distinct objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Empties the cache, handing every object back for release.
    pub fn drain(&mut self) -> Vec<Arc<V>> {
        self.entries.drain().map(|(_, value)| value).collect()
    }
}

impl<K: Copy + Eq + Hash, V> Default for StateCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::api::{CullingMode, RasterState, RasterStateKey};
    use std::convert::Infallible;

    #[derive(Debug)]
    struct NativeState(u64);

    fn create(key: RasterStateKey) -> Result<NativeState, Infallible> {
        Ok(NativeState(key.0))
    }

    #[test]
    fn test_equal_keys_share_one_object() {
        let mut cache = StateCache::new();
        let state = RasterState::default();
        let first = cache.get_or_create(state.key(), || create(state.key())).unwrap();
        let second = cache
            .get_or_create(RasterState::default().key(), || create(state.key()))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_different_keys_get_different_objects() {
        let mut cache = StateCache::new();
        let back = RasterState::default();
        let none = RasterState {
            culling: CullingMode::None,
            ..back
        };
        let a = cache.get_or_create(back.key(), || create(back.key())).unwrap();
        let b = cache.get_or_create(none.key(), || create(none.key())).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failed_creation_caches_nothing() {
        let mut cache: StateCache<u32, NativeState> = StateCache::new();
        let result = cache.get_or_create(7, || Err("device lost"));
        assert_eq!(result.unwrap_err(), "device lost");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_drain_releases_everything() {
        let mut cache = StateCache::new();
        for key in 0..4u32 {
            cache
                .get_or_create(key, || Ok::<_, Infallible>(NativeState(key as u64)))
                .unwrap();
        }
        assert_eq!(cache.drain().len(), 4);
        assert!(cache.is_empty());
    }
}
