//! CountingWeakMap: an address-indexed map with weakly-held keys.
//!
//! Keys are `Rc` allocations held via `std::rc::Weak`; values are held
//! strongly. A lookup hits only when the address matches *and* the
//! stored weak still upgrades: a live allocation at the same address is
//! necessarily the same allocation, and a dead weak must never match a
//! reused address.
//!
//! With deterministic reference counting there is no asynchronous
//! finalizer to register for the "became empty" notification; instead
//! the owner calls [`CountingWeakMap::sweep`] and observes the
//! emptiness transition itself.

use hashbrown::HashMap;
use std::rc::{Rc, Weak};

struct WeakEntry<T: ?Sized, V> {
    key: Weak<T>,
    value: V,
}

impl<T: ?Sized, V> WeakEntry<T, V> {
    fn is_live(&self) -> bool {
        self.key.strong_count() > 0
    }
}

/// Map from weakly-held `Rc` keys to strongly-held values.
pub struct CountingWeakMap<T: ?Sized, V> {
    entries: HashMap<usize, WeakEntry<T, V>>,
}

impl<T: ?Sized, V> CountingWeakMap<T, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn addr_of(key: &Rc<T>) -> usize {
        Rc::as_ptr(key).cast::<()>() as usize
    }

    /// Inserts `value` under `key`, replacing any entry at the same
    /// address (live or stale) and returning the replaced value.
    pub fn insert(&mut self, key: &Rc<T>, value: V) -> Option<V> {
        self.entries
            .insert(
                Self::addr_of(key),
                WeakEntry {
                    key: Rc::downgrade(key),
                    value,
                },
            )
            .map(|e| e.value)
    }

    /// Looks up the value for `key`; stale entries never match.
    pub fn get(&self, key: &Rc<T>) -> Option<&V> {
        self.entries
            .get(&Self::addr_of(key))
            .filter(|e| e.is_live())
            .map(|e| &e.value)
    }

    /// True iff a live entry exists for `key`.
    pub fn contains(&self, key: &Rc<T>) -> bool {
        self.get(key).is_some()
    }

    /// Removes the live entry for `key`, if any. Removal also cancels
    /// any pending sweep for that entry (the entry is gone).
    pub fn remove(&mut self, key: &Rc<T>) -> Option<V> {
        let addr = Self::addr_of(key);
        if self.entries.get(&addr).is_some_and(WeakEntry::is_live) {
            self.entries.remove(&addr).map(|e| e.value)
        } else {
            None
        }
    }

    /// Removes whatever entry sits at `addr`, live or stale.
    pub fn remove_addr(&mut self, addr: usize) -> Option<V> {
        self.entries.remove(&addr).map(|e| e.value)
    }

    /// Count of entries whose key is still alive.
    pub fn live_len(&self) -> usize {
        self.entries.values().filter(|e| e.is_live()).count()
    }

    /// Count of all entries, including dead ones not yet swept.
    pub fn total_len(&self) -> usize {
        self.entries.len()
    }

    /// True iff the map holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every dead-keyed entry, handing each removed
    /// `(address, value)` to `on_removed`; returns the number removed.
    pub fn sweep(&mut self, mut on_removed: impl FnMut(usize, V)) -> usize {
        let dead: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.is_live())
            .map(|(&addr, _)| addr)
            .collect();
        let n = dead.len();
        for addr in dead {
            if let Some(e) = self.entries.remove(&addr) {
                on_removed(addr, e.value);
            }
        }
        n
    }

    /// Iterates `(address, live, value)` over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, bool, &V)> + '_ {
        self.entries
            .iter()
            .map(|(&addr, e)| (addr, e.is_live(), &e.value))
    }
}

impl<T: ?Sized, V> Default for CountingWeakMap<T, V> {
    fn default() -> Self {
        Self::new()
    }
}
