use dashmap::DashSet;
use std::borrow::Borrow;
use std::hash::Hash;

/// Insertion-only set with an atomic check-and-set
///
/// Keys are never removed; the set grows for the lifetime of the run.
#[derive(Debug)]
pub struct SeenSet<K: Eq + Hash> {
    inner: DashSet<K>,
}

impl<K: Eq + Hash> SeenSet<K> {
    pub fn new() -> Self {
        Self {
            inner: DashSet::new(),
        }
    }

    /// Returns true iff `key` was absent and has now been added
    pub fn mark_if_new(&self, key: K) -> bool {
        self.inner.insert(key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Pre-populates the set, e.g. from a previous run's output
    pub fn preload<I: IntoIterator<Item = K>>(&self, keys: I) {
        for key in keys {
            self.inner.insert(key);
        }
    }
}

impl<K: Eq + Hash> Default for SeenSet<K> {
    fn default() -> Self {
        Self::new()
    }
}
