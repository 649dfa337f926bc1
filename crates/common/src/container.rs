//! Store-by-key registries
//!
//! Buckets, manifests, and peers all get held by identity somewhere; this
//! trait is that somewhere, without committing to a storage technology.
//! Values are handed out by clone, so implementors typically store cheap
//! handles (`Arc`s) rather than large owned data.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

/// A mapping from unique keys to values
///
/// `try_add` and `try_remove` are atomic with respect to each other for the
/// same key: of N concurrent adds for one key, exactly one succeeds. The
/// provided enumeration helpers are built purely on the four primitives and
/// skip keys that vanish between enumeration and lookup rather than error.
pub trait KeyedContainer<K, V>: Send + Sync
where
    K: Clone,
    V: Clone,
{
    /// Insert if absent; `false` (and no mutation) if the key is taken
    fn try_add(&self, key: K, value: V) -> bool;

    /// Look up a value by key
    fn try_get(&self, key: &K) -> Option<V>;

    /// Remove by key; `false` if nothing was there
    fn try_remove(&self, key: &K) -> bool;

    /// Every key currently present (a snapshot)
    fn keys(&self) -> Vec<K>;

    /// Key/value pairs present at enumeration time; concurrently removed
    /// keys are simply skipped
    fn entries(&self) -> Vec<(K, V)> {
        self.keys()
            .into_iter()
            .filter_map(|key| self.try_get(&key).map(|value| (key, value)))
            .collect()
    }

    /// Values present at enumeration time
    fn values(&self) -> Vec<V> {
        self.entries().into_iter().map(|(_, value)| value).collect()
    }
}

/// In-memory [`KeyedContainer`] over a hash map
#[derive(Debug)]
pub struct MemoryContainer<K, V> {
    inner: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> MemoryContainer<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> Default for MemoryContainer<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for MemoryContainer<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> KeyedContainer<K, V> for MemoryContainer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn try_add(&self, key: K, value: V) -> bool {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, value);
        true
    }

    fn try_get(&self, key: &K) -> Option<V> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn try_remove(&self, key: &K) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    fn keys(&self) -> Vec<K> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_add_get_remove() {
        let container = MemoryContainer::new();

        assert!(container.try_add("a", 1));
        assert!(!container.try_add("a", 2), "second add must not clobber");
        assert_eq!(container.try_get(&"a"), Some(1));

        assert!(container.try_remove(&"a"));
        assert!(!container.try_remove(&"a"));
        assert_eq!(container.try_get(&"a"), None);
    }

    #[test]
    fn test_enumeration_helpers() {
        let container = MemoryContainer::new();
        container.try_add("a", 1);
        container.try_add("b", 2);

        let mut entries = container.entries();
        entries.sort();
        assert_eq!(entries, vec![("a", 1), ("b", 2)]);

        let mut values = container.values();
        values.sort();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_concurrent_adds_have_one_winner() {
        let container = Arc::new(MemoryContainer::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let container = container.clone();
            handles.push(std::thread::spawn(move || container.try_add("key", i)));
        }

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(container.try_get(&"key").is_some());
    }
}
