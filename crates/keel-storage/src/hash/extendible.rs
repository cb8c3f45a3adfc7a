//! Extendible hash table.
//!
//! A dynamic hash scheme that grows by splitting individual buckets instead
//! of rehashing the whole table:
//!
//! - A **directory** of `2^global_depth` slots routes a key by the low
//!   `global_depth` bits of its hash.
//! - Each slot references a **bucket** holding at most `bucket_capacity`
//!   key/value pairs together with a `local_depth`. Several slots may alias
//!   one bucket while its `local_depth` is below `global_depth`.
//! - When a bucket overflows, it splits: its `local_depth` grows by one, a
//!   sibling bucket takes over the directory slots whose extra routing bit
//!   differs, and the pairs are redistributed between the two. The
//!   directory itself doubles only when the overflowing bucket already used
//!   every routing bit.
//!
//! Buckets live in an arena and directory slots hold arena indices, so
//! aliasing needs no shared ownership. A single mutex latches the whole
//! structure; every operation is a short critical section.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Upper bound on `global_depth`: the width of the hash in bits.
///
/// Splitting terminates because every split raises either the bucket's
/// `local_depth` or `global_depth`; a key set colliding on all 64 low hash
/// bits would defeat that, so insertion surfaces an error at this bound
/// instead of looping.
pub const MAX_GLOBAL_DEPTH: usize = 64;

/// Errors surfaced by the hash directory.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryError {
    /// The directory cannot double any further; the colliding keys are
    /// identical in all usable hash bits.
    #[error("hash directory is at maximum depth {max_depth} and cannot split further")]
    DepthExhausted {
        /// The depth bound that was hit.
        max_depth: usize,
    },
}

struct Bucket<K, V> {
    local_depth: usize,
    items: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(local_depth: usize) -> Self {
        Self {
            local_depth,
            items: Vec::new(),
        }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        let before = self.items.len();
        self.items.retain(|(k, _)| k != key);
        self.items.len() != before
    }

    /// Overwrites an existing key or appends if there is room; hands the
    /// pair back when the bucket is full.
    fn insert(&mut self, key: K, value: V, capacity: usize) -> Result<(), (K, V)> {
        if let Some((_, v)) = self.items.iter_mut().find(|(k, _)| *k == key) {
            *v = value;
            return Ok(());
        }
        if self.items.len() < capacity {
            self.items.push((key, value));
            return Ok(());
        }
        Err((key, value))
    }
}

struct Directory<K, V> {
    global_depth: usize,
    /// Slot -> bucket arena index; length is always `2^global_depth`.
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

/// Routing mask selecting the low `depth` bits of a hash.
fn mask(depth: usize) -> u64 {
    if depth == 0 {
        0
    } else {
        u64::MAX >> (64 - depth)
    }
}

/// Concurrent extendible hash table mapping keys to values.
///
/// The table is generic over the hasher so callers (and tests) can control
/// routing; by default it uses the same [`RandomState`] as
/// `std::collections::HashMap`.
///
/// # Example
///
/// ```rust
/// use keel_storage::hash::ExtendibleHashTable;
///
/// let table = ExtendibleHashTable::new(4);
/// table.insert(1, "one").unwrap();
/// table.insert(2, "two").unwrap();
/// assert_eq!(table.find(&1), Some("one"));
/// assert!(table.remove(&2));
/// assert_eq!(table.find(&2), None);
/// ```
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_capacity: usize,
    hasher: S,
    inner: Mutex<Directory<K, V>>,
}

impl<K: Hash + Eq, V: Clone> ExtendibleHashTable<K, V, RandomState> {
    /// Creates an empty table whose buckets hold up to `bucket_capacity`
    /// pairs.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_capacity` is zero.
    pub fn new(bucket_capacity: usize) -> Self {
        Self::with_hasher(bucket_capacity, RandomState::new())
    }
}

impl<K: Hash + Eq, V: Clone, S: BuildHasher> ExtendibleHashTable<K, V, S> {
    /// Creates an empty table routing keys through the given hasher.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_capacity` is zero.
    pub fn with_hasher(bucket_capacity: usize, hasher: S) -> Self {
        assert!(bucket_capacity > 0, "bucket capacity must be positive");
        Self {
            bucket_capacity,
            hasher,
            inner: Mutex::new(Directory {
                global_depth: 0,
                dir: vec![0],
                buckets: vec![Bucket::new(0)],
            }),
        }
    }

    /// Looks up the value stored under `key`.
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hasher.hash_one(key);
        let inner = self.inner.lock();
        let slot = inner.dir[(hash & mask(inner.global_depth)) as usize];
        inner.buckets[slot].find(key).cloned()
    }

    /// Removes `key` from the table; returns whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hasher.hash_one(key);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let slot = inner.dir[(hash & mask(inner.global_depth)) as usize];
        inner.buckets[slot].remove(key)
    }

    /// Inserts `key -> value`, overwriting any previous value for the key.
    ///
    /// Splits the target bucket (and doubles the directory when needed) as
    /// many times as it takes for the pair to fit. Fails only when the
    /// directory is already at [`MAX_GLOBAL_DEPTH`] and the bucket's keys
    /// all collide with the new one.
    pub fn insert(&self, mut key: K, mut value: V) -> Result<(), DirectoryError> {
        let hash = self.hasher.hash_one(&key);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        loop {
            let index = (hash & mask(inner.global_depth)) as usize;
            let slot = inner.dir[index];
            match inner.buckets[slot].insert(key, value, self.bucket_capacity) {
                Ok(()) => return Ok(()),
                Err(pair) => {
                    key = pair.0;
                    value = pair.1;
                }
            }
            if inner.buckets[slot].local_depth == MAX_GLOBAL_DEPTH {
                return Err(DirectoryError::DepthExhausted {
                    max_depth: MAX_GLOBAL_DEPTH,
                });
            }
            self.split(inner, index, slot);
        }
    }

    /// Splits the full bucket `slot` reached through directory slot `index`.
    fn split(&self, inner: &mut Directory<K, V>, index: usize, slot: usize) {
        if inner.buckets[slot].local_depth == inner.global_depth {
            // Every routing bit is in use: double the directory. Appending a
            // copy of each slot keeps `dir[j + old_len] == dir[j]`.
            let old_len = inner.dir.len();
            for j in 0..old_len {
                let aliased = inner.dir[j];
                inner.dir.push(aliased);
            }
            inner.global_depth += 1;
        }

        let new_depth = inner.buckets[slot].local_depth + 1;
        inner.buckets[slot].local_depth = new_depth;

        // The sibling takes over the slots whose low `new_depth` bits match
        // `index` except in the new routing bit.
        let routing = mask(new_depth);
        let sibling = (index as u64 & routing) ^ (1u64 << (new_depth - 1));

        let new_slot = inner.buckets.len();
        inner.buckets.push(Bucket::new(new_depth));
        for j in 0..inner.dir.len() {
            if j as u64 & routing == sibling {
                inner.dir[j] = new_slot;
            }
        }

        // Redistribute by the new routing bit.
        let items = std::mem::take(&mut inner.buckets[slot].items);
        for (k, v) in items {
            let target = if self.hasher.hash_one(&k) & routing == sibling {
                new_slot
            } else {
                slot
            };
            inner.buckets[target].items.push((k, v));
        }

        debug!(
            global_depth = inner.global_depth,
            num_buckets = inner.buckets.len(),
            "split hash bucket"
        );
    }

    /// Returns the directory's global depth.
    pub fn global_depth(&self) -> usize {
        self.inner.lock().global_depth
    }

    /// Returns the local depth of the bucket referenced by directory slot
    /// `dir_index`.
    ///
    /// # Panics
    ///
    /// Panics if `dir_index` is outside the directory.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let inner = self.inner.lock();
        inner.buckets[inner.dir[dir_index]].local_depth
    }

    /// Returns the number of buckets allocated so far.
    pub fn num_buckets(&self) -> usize {
        self.inner.lock().buckets.len()
    }

    /// Returns the number of key/value pairs stored.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .buckets
            .iter()
            .map(|b| b.items.len())
            .sum()
    }

    /// Returns whether the table holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the per-bucket pair capacity.
    pub fn bucket_capacity(&self) -> usize {
        self.bucket_capacity
    }
}

impl<K, V, S> std::fmt::Debug for ExtendibleHashTable<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ExtendibleHashTable")
            .field("global_depth", &inner.global_depth)
            .field("num_buckets", &inner.buckets.len())
            .field("bucket_capacity", &self.bucket_capacity)
            .finish()
    }
}
