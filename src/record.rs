//! Frozen record and tuple builders.
//!
//! Both aggregates are immutable, cheap to clone, and expose the
//! projection protocol: their canonical key is a composite key over a
//! namespace marker followed by their contents, built on first access
//! and cached. Structural equality and hashing go through that key.

use crate::error::{Error, Result};
use crate::handle::{canonicalize, CompositeKey, Keyed};
use crate::part::{KeyPart, Sym};
use crate::trie::composite_key;
use std::any::Any;
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

// Namespace markers keep record keys, tuple keys, and user sequences in
// disjoint regions of the trie. Held for the life of the thread.
struct RecordMarker;
struct TupleMarker;

thread_local! {
    static RECORD_MARKER: Rc<RecordMarker> = Rc::new(RecordMarker);
    static TUPLE_MARKER: Rc<TupleMarker> = Rc::new(TupleMarker);
}

fn record_marker() -> Rc<dyn Any> {
    RECORD_MARKER.with(|m| m.clone() as Rc<dyn Any>)
}

fn tuple_marker() -> Rc<dyn Any> {
    TUPLE_MARKER.with(|m| m.clone() as Rc<dyn Any>)
}

/// A record field key: a symbol or a string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordKey {
    /// Symbol key; sorts before every string key.
    Sym(Sym),
    /// String key; sorts last, lexicographically.
    Str(Rc<str>),
}

impl RecordKey {
    fn as_part(&self) -> KeyPart {
        match self {
            RecordKey::Sym(s) => KeyPart::Sym(s.clone()),
            RecordKey::Str(s) => KeyPart::Str(s.clone()),
        }
    }

    fn display(&self) -> String {
        match self {
            RecordKey::Str(s) => s.to_string(),
            RecordKey::Sym(s) => match s.description() {
                Some(d) => d.to_string(),
                None => "symbol".to_string(),
            },
        }
    }
}

impl From<&str> for RecordKey {
    fn from(s: &str) -> Self {
        RecordKey::Str(Rc::from(s))
    }
}
impl From<String> for RecordKey {
    fn from(s: String) -> Self {
        RecordKey::Str(Rc::from(s.as_str()))
    }
}
impl From<Sym> for RecordKey {
    fn from(s: Sym) -> Self {
        RecordKey::Sym(s)
    }
}

/// Canonical field order: symbols before strings; registered symbols by
/// name; unique symbols after all registered ones, by first-seen order;
/// strings lexicographically.
fn field_order(a: &RecordKey, b: &RecordKey) -> Ordering {
    match (a, b) {
        (RecordKey::Sym(x), RecordKey::Sym(y)) => sym_order(x, y),
        (RecordKey::Sym(_), RecordKey::Str(_)) => Ordering::Less,
        (RecordKey::Str(_), RecordKey::Sym(_)) => Ordering::Greater,
        (RecordKey::Str(x), RecordKey::Str(y)) => x.cmp(y),
    }
}

fn sym_order(x: &Sym, y: &Sym) -> Ordering {
    match (x.registered_name(), y.registered_name()) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => x.seq().cmp(&y.seq()),
    }
}

struct RecordRepr {
    fields: Vec<(RecordKey, KeyPart)>,
    key: OnceCell<CompositeKey>,
}

/// A frozen, structurally-compared field map.
#[derive(Clone)]
pub struct Record {
    repr: Rc<RecordRepr>,
}

impl Record {
    /// Builds a record, sorting fields into canonical order.
    ///
    /// Two fields with equal keys are rejected with
    /// [`Error::DuplicateField`].
    pub fn new<I>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (RecordKey, KeyPart)>,
    {
        let mut fields: Vec<(RecordKey, KeyPart)> = fields.into_iter().collect();
        fields.sort_by(|(a, _), (b, _)| field_order(a, b));
        for pair in fields.windows(2) {
            if field_order(&pair[0].0, &pair[1].0) == Ordering::Equal {
                return Err(Error::DuplicateField {
                    field: pair[0].0.display(),
                });
            }
        }
        Ok(Record {
            repr: Rc::new(RecordRepr {
                fields,
                key: OnceCell::new(),
            }),
        })
    }

    /// Looks up a field value by key.
    pub fn get(&self, key: &RecordKey) -> Option<&KeyPart> {
        self.repr
            .fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.repr.fields.len()
    }

    /// True iff the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.repr.fields.is_empty()
    }

    /// Iterates fields in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &KeyPart)> {
        self.repr.fields.iter().map(|(k, v)| (k, v))
    }
}

impl Keyed for Record {
    fn canonical_key(&self) -> CompositeKey {
        self.repr
            .key
            .get_or_init(|| {
                let mut parts = Vec::with_capacity(1 + self.repr.fields.len() * 2);
                parts.push(KeyPart::Object(record_marker()));
                for (k, v) in &self.repr.fields {
                    parts.push(k.as_part());
                    parts.push(canonicalize(v.clone()));
                }
                composite_key(parts)
            })
            .clone()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.repr, &other.repr) || self.canonical_key() == other.canonical_key()
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.repr.fields.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

struct TupleRepr {
    items: Vec<KeyPart>,
    key: OnceCell<CompositeKey>,
}

/// A frozen, structurally-compared sequence.
#[derive(Clone)]
pub struct Tuple {
    repr: Rc<TupleRepr>,
}

impl Tuple {
    /// Builds a tuple from an ordered sequence of parts.
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = KeyPart>,
    {
        Tuple {
            repr: Rc::new(TupleRepr {
                items: items.into_iter().collect(),
                key: OnceCell::new(),
            }),
        }
    }

    /// The item at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&KeyPart> {
        self.repr.items.get(index)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.repr.items.len()
    }

    /// True iff the tuple has no items.
    pub fn is_empty(&self) -> bool {
        self.repr.items.is_empty()
    }

    /// Iterates items in order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyPart> {
        self.repr.items.iter()
    }
}

impl Keyed for Tuple {
    fn canonical_key(&self) -> CompositeKey {
        self.repr
            .key
            .get_or_init(|| {
                let mut parts = Vec::with_capacity(1 + self.repr.items.len());
                parts.push(KeyPart::Object(tuple_marker()));
                parts.extend(self.repr.items.iter().cloned().map(canonicalize));
                composite_key(parts)
            })
            .clone()
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.repr, &other.repr) || self.canonical_key() == other.canonical_key()
    }
}

impl Eq for Tuple {}

impl Hash for Tuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.repr.items.iter()).finish()
    }
}
