//! Map keyed by canonical identifier.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use indexmap::map::{Entry, IndexMap};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{EntryKind, Error, Result};
use crate::ident::{normalize, CanonicalKey, Ident};

/// Insertion-ordered map whose keys are normalized on every access.
///
/// Lookups with an invalid identifier simply miss; inserts with one fail
/// with [`Error::InvalidIdentifier`](crate::Error::InvalidIdentifier).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedMap<V> {
    inner: IndexMap<CanonicalKey, V>,
}

impl<V> Default for NormalizedMap<V> {
    fn default() -> Self {
        Self {
            inner: IndexMap::new(),
        }
    }
}

impl<V> NormalizedMap<V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from key/value pairs.
    ///
    /// Repeating a key with the same text overwrites the earlier value; see
    /// [`try_extend`](Self::try_extend) for keys written differently.
    pub fn try_from_iter<K: Ident>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self> {
        let mut map = Self::new();
        map.try_extend(pairs)?;
        Ok(map)
    }

    /// Insert a value, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Ident, value: V) -> Result<Option<V>> {
        Ok(self.inner.insert(normalize(key)?, value))
    }

    /// Insert many values.
    ///
    /// Fails with [`Error::AmbiguousMapping`] when two keys of the batch are
    /// written differently but normalize alike. Keys already in the map are
    /// overwritten as with [`insert`](Self::insert).
    pub fn try_extend<K: Ident>(&mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Result<()> {
        let mut seen: HashMap<CanonicalKey, String> = HashMap::new();
        for (key, value) in pairs {
            let canonical = normalize(&key)?;
            let raw = key.ident_text();
            match seen.get(&canonical) {
                Some(first) if *first != raw => {
                    return Err(Error::AmbiguousMapping {
                        owner: "NormalizedMap".to_string(),
                        kind: EntryKind::MapKey,
                        key: canonical,
                        first: first.clone(),
                        second: raw.into_owned(),
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(canonical.clone(), raw.into_owned());
                }
            }
            self.inner.insert(canonical, value);
        }
        Ok(())
    }

    /// Look up a value.
    pub fn get(&self, key: impl Ident) -> Option<&V> {
        normalize(key).ok().and_then(|k| self.inner.get(&k))
    }

    /// Look up a value mutably.
    pub fn get_mut(&mut self, key: impl Ident) -> Option<&mut V> {
        let key = normalize(key).ok()?;
        self.inner.get_mut(&key)
    }

    /// Value for `key`, inserting `default()` first if absent.
    pub fn get_or_insert_with(
        &mut self,
        key: impl Ident,
        default: impl FnOnce() -> V,
    ) -> Result<&mut V> {
        Ok(match self.inner.entry(normalize(key)?) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(default()),
        })
    }

    /// Remove a value, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: impl Ident) -> Option<V> {
        normalize(key).ok().and_then(|k| self.inner.shift_remove(&k))
    }

    /// Check if a key is present.
    pub fn contains_key(&self, key: impl Ident) -> bool {
        normalize(key).is_ok_and(|k| self.inner.contains_key(&k))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &CanonicalKey> {
        self.inner.keys()
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.values()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalKey, &V)> {
        self.inner.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<'a, V> IntoIterator for &'a NormalizedMap<V> {
    type Item = (&'a CanonicalKey, &'a V);
    type IntoIter = indexmap::map::Iter<'a, CanonicalKey, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl<V> IntoIterator for NormalizedMap<V> {
    type Item = (CanonicalKey, V);
    type IntoIter = indexmap::map::IntoIter<CanonicalKey, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

struct NormalizedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for NormalizedMapVisitor<V> {
    type Value = NormalizedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map with non-empty identifier keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut map = NormalizedMap::new();
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            let canonical = normalize(key.as_str()).map_err(serde::de::Error::custom)?;
            if map.inner.contains_key(&canonical) {
                return Err(serde::de::Error::custom(format!(
                    "keys normalizing to '{canonical}' appear more than once"
                )));
            }
            map.inner.insert(canonical, value);
        }
        Ok(map)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for NormalizedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(NormalizedMapVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sample() -> NormalizedMap<i32> {
        NormalizedMap::try_from_iter([("A", 1), ("b", 2)]).unwrap()
    }

    #[test]
    fn test_get_and_contains() {
        let map = sample();
        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.get("B"), Some(&2));
        assert!(map.contains_key("A"));
        assert!(!map.contains_key("c"));
        assert_eq!(map.get(""), None);
    }

    #[test]
    fn test_insert_overwrites_by_canonical_key() {
        let mut map = sample();
        assert_eq!(map.insert("a", 10).unwrap(), Some(1));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("A"), Some(&10));
    }

    #[test]
    fn test_insert_invalid_key() {
        let mut map = sample();
        assert!(matches!(map.insert(" ", 3), Err(Error::InvalidIdentifier { .. })));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_remove_and_default() {
        let mut map = sample();
        assert_eq!(map.remove("A"), Some(1));
        assert!(!map.contains_key("a"));
        assert_eq!(*map.get_or_insert_with("D", || 4).unwrap(), 4);
        assert_eq!(*map.get_or_insert_with("d", || 99).unwrap(), 4);
        let keys: Vec<_> = map.keys().map(CanonicalKey::as_str).collect();
        assert_eq!(keys, ["b", "d"]);
    }

    #[test]
    fn test_batch_rejects_keys_written_differently() {
        let err = NormalizedMap::try_from_iter([("Top", 1), ("top", 2)]).unwrap_err();
        match err {
            Error::AmbiguousMapping { kind, key, first, second, .. } => {
                assert_eq!(kind, EntryKind::MapKey);
                assert_eq!(key.as_str(), "top");
                assert_eq!((first.as_str(), second.as_str()), ("Top", "top"));
            }
            other => panic!("expected AmbiguousMapping, got {other:?}"),
        }

        // The same text twice is a plain overwrite.
        let map = NormalizedMap::try_from_iter([("top", 1), ("top", 2)]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("TOP"), Some(&2));

        let mut map = sample();
        map.try_extend([("a", 5)]).unwrap();
        assert_eq!(map.get("A"), Some(&5));
        assert!(map.try_extend([("c", 1), ("C", 2)]).is_err());
    }

    #[test]
    fn test_deserialize_normalizes() {
        let map: NormalizedMap<f64> = serde_json::from_str(r#"{"Bottom": 9, "TOP": 12.5}"#).unwrap();
        assert_eq!(map.get("bottom"), Some(&9.0));
        assert_eq!(map.get("top"), Some(&12.5));

        let dup = serde_json::from_str::<NormalizedMap<f64>>(r#"{"Top": 1, "top": 2}"#);
        assert!(dup.is_err());
    }
}
