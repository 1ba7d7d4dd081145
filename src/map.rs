//! KeyedMap: a hash map with an optional projection deriving lookup
//! keys from user values.
//!
//! With a projection configured, every operation first maps the caller's
//! key to a [`KeyPart`]; a composite-key-ish result (key, record, tuple)
//! is substituted by its identity token, an object result by its
//! allocation identity (held strongly — container keys are strong), and
//! an eternal result by its value. Without a projection, keys use their
//! own `Eq`/`Hash`. Entries keep the original key, so iteration yields
//! what the caller inserted.

use crate::handle::{canonicalize, CompositeKey};
use crate::part::{eternal_label, EternalLabel, KeyPart};
use hashbrown::{Equivalent, HashMap};
use std::any::Any;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::rc::Rc;

/// Strongly-held allocation identity used when a projection yields an
/// object or unique symbol.
pub(crate) struct ObjectIdentity {
    addr: usize,
    _keep: Rc<dyn Any>,
}

impl ObjectIdentity {
    fn new(rc: Rc<dyn Any>) -> Self {
        ObjectIdentity {
            addr: Rc::as_ptr(&rc).cast::<()>() as usize,
            _keep: rc,
        }
    }
}

impl PartialEq for ObjectIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}
impl Eq for ObjectIdentity {}
impl Hash for ObjectIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.addr);
    }
}

/// The internal key a map entry is stored under.
pub(crate) enum StoredKey<K> {
    /// No projection: the caller's key itself.
    Direct(K),
    /// Projection yielded a composite key; compared by token identity.
    Token(CompositeKey),
    /// Projection yielded an eternal value; compared by value.
    Label(EternalLabel),
    /// Projection yielded an identity-bearing value; compared by
    /// allocation.
    Object(ObjectIdentity),
}

impl<K: PartialEq> PartialEq for StoredKey<K> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StoredKey::Direct(a), StoredKey::Direct(b)) => a == b,
            (StoredKey::Token(a), StoredKey::Token(b)) => a == b,
            (StoredKey::Label(a), StoredKey::Label(b)) => a == b,
            (StoredKey::Object(a), StoredKey::Object(b)) => a == b,
            _ => false,
        }
    }
}
impl<K: Eq> Eq for StoredKey<K> {}

impl<K: Hash> Hash for StoredKey<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            StoredKey::Direct(k) => {
                state.write_u8(0);
                k.hash(state);
            }
            StoredKey::Token(key) => {
                state.write_u8(1);
                key.hash(state);
            }
            StoredKey::Label(label) => {
                state.write_u8(2);
                label.hash(state);
            }
            StoredKey::Object(obj) => {
                state.write_u8(3);
                obj.hash(state);
            }
        }
    }
}

/// Borrowed lookup key for the no-projection path; hashes exactly like
/// `StoredKey::Direct`.
struct DirectQuery<'a, K>(&'a K);

impl<K: Hash> Hash for DirectQuery<'_, K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(0);
        self.0.hash(state);
    }
}

impl<K: Eq> Equivalent<StoredKey<K>> for DirectQuery<'_, K> {
    fn equivalent(&self, key: &StoredKey<K>) -> bool {
        matches!(key, StoredKey::Direct(k) if k == self.0)
    }
}

struct Slot<K, V> {
    /// Present iff the entry went in through a projection (otherwise
    /// the key lives in `StoredKey::Direct`).
    original: Option<K>,
    value: V,
}

type Projector<K> = Box<dyn Fn(&K) -> KeyPart>;

/// Hash map with optional key projection.
pub struct KeyedMap<K, V, S = RandomState> {
    projection: Option<Projector<K>>,
    entries: HashMap<StoredKey<K>, Slot<K, V>, S>,
}

impl<K, V> KeyedMap<K, V>
where
    K: Eq + Hash,
{
    /// A map comparing keys by their own equality.
    pub fn new() -> Self {
        Self::with_hasher(RandomState::default())
    }

    /// A map deriving lookup keys through `projection`.
    pub fn with_projection<F>(projection: F) -> Self
    where
        F: Fn(&K) -> KeyPart + 'static,
    {
        Self::with_projection_and_hasher(projection, RandomState::default())
    }
}

impl<K, V> Default for KeyedMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> KeyedMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// A direct-keyed map with a custom hasher.
    pub fn with_hasher(hasher: S) -> Self {
        KeyedMap {
            projection: None,
            entries: HashMap::with_hasher(hasher),
        }
    }

    /// A projected map with a custom hasher.
    pub fn with_projection_and_hasher<F>(projection: F, hasher: S) -> Self
    where
        F: Fn(&K) -> KeyPart + 'static,
    {
        KeyedMap {
            projection: Some(Box::new(projection)),
            entries: HashMap::with_hasher(hasher),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn substitute(part: KeyPart) -> StoredKey<K> {
        match canonicalize(part) {
            KeyPart::Key(key) => StoredKey::Token(key),
            KeyPart::Object(rc) => StoredKey::Object(ObjectIdentity::new(rc)),
            KeyPart::Sym(sym) => match sym.cell_identity() {
                Some(cell) => StoredKey::Object(ObjectIdentity::new(cell)),
                None => StoredKey::Label(
                    eternal_label(&KeyPart::Sym(sym))
                        .expect("registered symbol has an eternal label"),
                ),
            },
            part => StoredKey::Label(
                eternal_label(&part).expect("non-identity part has an eternal label"),
            ),
        }
    }

    /// Inserts `value` under `key`, returning the previous value for an
    /// equal key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let (stored, slot) = match &self.projection {
            None => (
                StoredKey::Direct(key),
                Slot {
                    original: None,
                    value,
                },
            ),
            Some(project) => {
                let stored = Self::substitute(project(&key));
                (
                    stored,
                    Slot {
                        original: Some(key),
                        value,
                    },
                )
            }
        };
        self.entries.insert(stored, slot).map(|s| s.value)
    }

    /// Looks up the value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        match &self.projection {
            None => self
                .entries
                .get(&DirectQuery(key))
                .map(|slot| &slot.value),
            Some(project) => {
                let stored = Self::substitute(project(key));
                self.entries.get(&stored).map(|slot| &slot.value)
            }
        }
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match &self.projection {
            None => self
                .entries
                .get_mut(&DirectQuery(key))
                .map(|slot| &mut slot.value),
            Some(project) => {
                let stored = Self::substitute(project(key));
                self.entries.get_mut(&stored).map(|slot| &mut slot.value)
            }
        }
    }

    /// True iff an entry exists for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes the entry for `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        match &self.projection {
            None => self
                .entries
                .remove(&DirectQuery(key))
                .map(|slot| slot.value),
            Some(project) => {
                let stored = Self::substitute(project(key));
                self.entries.remove(&stored).map(|slot| slot.value)
            }
        }
    }

    /// Iterates `(original key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(stored, slot)| {
            let key = match stored {
                StoredKey::Direct(k) => k,
                _ => slot
                    .original
                    .as_ref()
                    .expect("projected entry stores its original key"),
            };
            (key, &slot.value)
        })
    }
}
