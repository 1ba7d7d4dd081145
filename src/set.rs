//! KeyedSet: membership under the same optional projection as
//! [`KeyedMap`](crate::KeyedMap).

use crate::map::KeyedMap;
use crate::part::KeyPart;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

/// Hash set with optional element projection.
pub struct KeyedSet<T, S = RandomState> {
    map: KeyedMap<T, (), S>,
}

impl<T> KeyedSet<T>
where
    T: Eq + Hash,
{
    /// A set comparing elements by their own equality.
    pub fn new() -> Self {
        KeyedSet {
            map: KeyedMap::new(),
        }
    }

    /// A set deriving membership keys through `projection`.
    pub fn with_projection<F>(projection: F) -> Self
    where
        F: Fn(&T) -> KeyPart + 'static,
    {
        KeyedSet {
            map: KeyedMap::with_projection(projection),
        }
    }
}

impl<T> Default for KeyedSet<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> KeyedSet<T, S>
where
    T: Eq + Hash,
    S: BuildHasher,
{
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True iff the set has no elements.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Adds `value`; returns true iff it was not already present.
    pub fn insert(&mut self, value: T) -> bool {
        self.map.insert(value, ()).is_none()
    }

    /// True iff an equal element is present.
    pub fn contains(&self, value: &T) -> bool {
        self.map.contains_key(value)
    }

    /// Removes an equal element; returns true iff one was present.
    pub fn remove(&mut self, value: &T) -> bool {
        self.map.remove(value).is_some()
    }

    /// Iterates the original elements.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.map.iter().map(|(k, _)| k)
    }
}
