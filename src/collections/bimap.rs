//! BiMap Module
//!
//! A one-to-one mapping that can be looked up from either side.

use std::collections::HashMap;
use std::hash::Hash;

// == BiMap ==
/// Bijective map kept as two reverse-synchronized indices.
///
/// Every mutation updates `forward` and `backward` together, so for
/// every `(k, v)` in `forward`, `backward[v] == k` and vice versa.
#[derive(Debug, Clone)]
pub struct BiMap<K, V> {
    /// key -> value
    forward: HashMap<K, V>,
    /// value -> key
    backward: HashMap<V, K>,
}

impl<K, V> Default for BiMap<K, V> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            backward: HashMap::new(),
        }
    }
}

impl<K, V> BiMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    // == Constructor ==
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Binds `key` to `value` in both directions.
    ///
    /// The previous pair for `key` is removed from both indices, and any
    /// other key currently bound to `value` is unbound, before the new
    /// pair is inserted.
    ///
    /// # Returns
    /// The value previously bound to `key`, if any.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let old_value = self.forward.remove(&key);
        if let Some(old) = &old_value {
            self.backward.remove(old);
        }

        if let Some(other_key) = self.backward.remove(&value) {
            self.forward.remove(&other_key);
        }

        self.forward.insert(key.clone(), value.clone());
        self.backward.insert(value, key);
        old_value
    }

    // == Lookups ==
    /// Returns the value bound to `key`.
    pub fn get_by_key(&self, key: &K) -> Option<&V> {
        self.forward.get(key)
    }

    /// Returns the key bound to `value`.
    pub fn get_by_value(&self, value: &V) -> Option<&K> {
        self.backward.get(value)
    }

    /// Returns the value bound to `key`, or `default` without inserting it.
    pub fn get_by_key_or(&self, key: &K, default: V) -> V {
        self.forward.get(key).cloned().unwrap_or(default)
    }

    /// Returns the key bound to `value`, or `default` without inserting it.
    pub fn get_by_value_or(&self, value: &V, default: K) -> K {
        self.backward.get(value).cloned().unwrap_or(default)
    }

    // == Get Or Insert ==
    /// Returns the value bound to `key`, binding `default` first if absent.
    pub fn get_or_insert_default(&mut self, key: K, default: V) -> &V {
        if !self.forward.contains_key(&key) {
            self.set(key.clone(), default);
        }
        &self.forward[&key]
    }

    /// Returns the key bound to `value`, binding `default_key` first if absent.
    ///
    /// Binding goes through [`BiMap::set`], so a previous value of
    /// `default_key` is unbound.
    pub fn get_or_insert_key_default(&mut self, value: V, default_key: K) -> &K {
        if !self.backward.contains_key(&value) {
            self.set(default_key, value.clone());
        }
        &self.backward[&value]
    }

    // == Delete ==
    /// Removes the pair whose key is `key`.
    ///
    /// # Returns
    /// `true` if a pair was removed.
    pub fn delete_by_key(&mut self, key: &K) -> bool {
        match self.forward.remove(key) {
            Some(value) => {
                self.backward.remove(&value);
                true
            }
            None => false,
        }
    }

    /// Removes the pair whose value is `value`.
    pub fn delete_by_value(&mut self, value: &V) -> bool {
        match self.backward.remove(value) {
            Some(key) => {
                self.forward.remove(&key);
                true
            }
            None => false,
        }
    }

    // == Inspection ==
    pub fn contains_key(&self, key: &K) -> bool {
        self.forward.contains_key(key)
    }

    pub fn contains_value(&self, value: &V) -> bool {
        self.backward.contains_key(value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.forward.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.forward.values()
    }

    /// Iterates over `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.forward.iter()
    }

    /// Iterates over `(value, key)` pairs.
    pub fn iter_by_value(&self) -> impl Iterator<Item = (&V, &K)> {
        self.backward.iter()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Removes every pair.
    pub fn clear(&mut self) {
        self.forward.clear();
        self.backward.clear();
    }
}
