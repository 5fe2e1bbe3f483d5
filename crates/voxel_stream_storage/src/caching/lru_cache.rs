use super::IndexList;
use crate::SmallKeyBuildHasher;

use core::hash::{BuildHasher, Hash};
use std::collections::{hash_map, HashMap};

/// A cache that tracks the Least Recently Used element for next eviction.
///
/// LRU order is updated on insertion and on access through `get_mut_or_try_insert_with`.
///
/// Eviction does not happen inline; the user must explicitly call `remove_lru` to drop the LRU element. Thus the cache may
/// grow unbounded unless evictions or explicit removals occur. The voxel world does this once per frame, when it trims the
/// decoded chunk cache back to capacity.
#[derive(Clone, Debug)]
pub struct LruCache<K, V, H> {
    store: HashMap<K, (V, usize), H>,
    order: IndexList<K>,
}

/// An `LruCache` using the aHash hashing algorithm.
pub type SmallKeyLruCache<K, V> = LruCache<K, V, SmallKeyBuildHasher>;

impl<K, V, H> Default for LruCache<K, V, H>
where
    H: Default,
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V, H> LruCache<K, V, H>
where
    K: Hash + Eq,
{
    pub fn with_hasher(hasher_builder: H) -> LruCache<K, V, H> {
        LruCache {
            store: HashMap::with_hasher(hasher_builder),
            order: IndexList::new(),
        }
    }
}

impl<K, V, H> LruCache<K, V, H>
where
    K: Hash + Eq + Clone,
    H: BuildHasher,
{
    /// Inserts a `new_val` for `key`, returning the old value if it exists. `key` becomes the most recently used.
    #[inline]
    pub fn insert(&mut self, key: K, new_val: V) -> Option<V> {
        let Self { store, order } = self;
        match store.entry(key.clone()) {
            hash_map::Entry::Occupied(occupied) => {
                let (old_val, i) = occupied.into_mut();
                order.move_to_front(*i);

                Some(std::mem::replace(old_val, new_val))
            }
            hash_map::Entry::Vacant(vacant) => {
                let new_i = order.push_front(key);
                vacant.insert((new_val, new_i));

                None
            }
        }
    }

    /// Gets the value for `key`, marking it most recently used. If there is no entry, calls `on_missing` to populate the entry.
    /// A failure from `on_missing` leaves the cache untouched.
    #[inline]
    pub fn get_mut_or_try_insert_with<E>(
        &mut self,
        key: K,
        on_missing: impl FnOnce() -> Result<V, E>,
    ) -> Result<&mut V, E> {
        let Self { store, order } = self;
        match store.entry(key.clone()) {
            hash_map::Entry::Occupied(occupied) => {
                let (val, i) = occupied.into_mut();
                order.move_to_front(*i);

                Ok(val)
            }
            hash_map::Entry::Vacant(vacant) => {
                let new_val = on_missing()?;
                let new_i = order.push_front(key);

                Ok(&mut vacant.insert((new_val, new_i)).0)
            }
        }
    }

    /// Removes any trace of `key`, such that further accesses will return `None` until a new value is inserted.
    #[inline]
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.store.remove(key).map(|(val, i)| {
            self.order.remove(i);

            val
        })
    }

    /// Removes every entry whose key fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        let doomed: Vec<K> = self.store.keys().filter(|k| !keep(k)).cloned().collect();
        for key in doomed.iter() {
            self.remove(key);
        }
    }

    /// Removes the least-recently used value, leaving no trace.
    #[inline]
    pub fn remove_lru(&mut self) -> Option<(K, V)> {
        let key = self.order.pop_back()?;
        let (val, _) = self.store.remove(&key)?;

        Some((key, val))
    }

    /// Delete all entries.
    #[inline]
    pub fn clear(&mut self) {
        self.store.clear();
        self.order.clear();
    }

    /// The number of cached entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

// ████████╗███████╗███████╗████████╗███████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝
//    ██║   █████╗  ███████╗   ██║   ███████╗
//    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║
//    ██║   ███████╗███████║   ██║   ███████║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝
