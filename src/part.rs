//! Input value model: key components, symbols, and the classifier.
//!
//! A composite key is built from an ordered sequence of [`KeyPart`]s.
//! Every part is either *identity-bearing* (compared by allocation
//! address, admissible as a weak-map key) or *eternal* (compared by
//! value, held strongly). [`classify`] partitions the two.

use crate::handle::{CompositeKey, Keyed};
use crate::record::{Record, Tuple};
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// One component of a composite key.
///
/// Cheap to clone: every variant is either `Copy` data or a reference-
/// counted pointer.
#[derive(Clone)]
pub enum KeyPart {
    /// The unit value.
    Unit,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float, compared SameValueZero (`NaN == NaN`, `-0.0 == +0.0`).
    Float(f64),
    /// String, compared by contents.
    Str(Rc<str>),
    /// Symbol; registered symbols compare by name, unique ones by identity.
    Sym(Sym),
    /// An arbitrary allocation compared by address.
    Object(Rc<dyn Any>),
    /// A nested composite key; reduces to its identity token.
    Key(CompositeKey),
    /// A frozen record; reduces to its canonical key.
    Record(Record),
    /// A frozen tuple; reduces to its canonical key.
    Tuple(Tuple),
}

impl KeyPart {
    /// Wraps any `Rc` allocation as an identity-bearing component.
    pub fn object<T: 'static>(value: Rc<T>) -> Self {
        KeyPart::Object(value)
    }
}

impl fmt::Debug for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Unit => f.write_str("Unit"),
            KeyPart::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            KeyPart::Int(n) => f.debug_tuple("Int").field(n).finish(),
            KeyPart::Float(x) => f.debug_tuple("Float").field(x).finish(),
            KeyPart::Str(s) => f.debug_tuple("Str").field(s).finish(),
            KeyPart::Sym(s) => s.fmt(f),
            KeyPart::Object(rc) => f
                .debug_tuple("Object")
                .field(&Rc::as_ptr(rc).cast::<()>())
                .finish(),
            KeyPart::Key(k) => k.fmt(f),
            KeyPart::Record(r) => r.fmt(f),
            KeyPart::Tuple(t) => t.fmt(f),
        }
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeyPart::Unit, KeyPart::Unit) => true,
            (KeyPart::Bool(a), KeyPart::Bool(b)) => a == b,
            (KeyPart::Int(a), KeyPart::Int(b)) => a == b,
            (KeyPart::Float(a), KeyPart::Float(b)) => {
                canonical_float_bits(*a) == canonical_float_bits(*b)
            }
            (KeyPart::Str(a), KeyPart::Str(b)) => a == b,
            (KeyPart::Sym(a), KeyPart::Sym(b)) => a == b,
            (KeyPart::Object(a), KeyPart::Object(b)) => {
                Rc::as_ptr(a).cast::<()>() == Rc::as_ptr(b).cast::<()>()
            }
            (KeyPart::Key(a), KeyPart::Key(b)) => a == b,
            (KeyPart::Record(a), KeyPart::Record(b)) => a == b,
            (KeyPart::Tuple(a), KeyPart::Tuple(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for KeyPart {}

impl From<()> for KeyPart {
    fn from((): ()) -> Self {
        KeyPart::Unit
    }
}
impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}
impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}
impl From<i32> for KeyPart {
    fn from(n: i32) -> Self {
        KeyPart::Int(n.into())
    }
}
impl From<f64> for KeyPart {
    fn from(x: f64) -> Self {
        KeyPart::Float(x)
    }
}
impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Str(Rc::from(s))
    }
}
impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Str(Rc::from(s.as_str()))
    }
}
impl From<Rc<str>> for KeyPart {
    fn from(s: Rc<str>) -> Self {
        KeyPart::Str(s)
    }
}
impl From<Sym> for KeyPart {
    fn from(s: Sym) -> Self {
        KeyPart::Sym(s)
    }
}
impl From<CompositeKey> for KeyPart {
    fn from(k: CompositeKey) -> Self {
        KeyPart::Key(k)
    }
}
impl From<Record> for KeyPart {
    fn from(r: Record) -> Self {
        KeyPart::Record(r)
    }
}
impl From<Tuple> for KeyPart {
    fn from(t: Tuple) -> Self {
        KeyPart::Tuple(t)
    }
}

/// Symbol value.
///
/// `Sym::for_name` returns a *registered* symbol: eternal, equal to any
/// other registered symbol with the same name. [`Sym::new`] returns a
/// *unique* symbol: a fresh identity-bearing allocation equal only to
/// its own clones.
#[derive(Clone)]
pub struct Sym(SymRepr);

#[derive(Clone)]
enum SymRepr {
    Registered(Rc<str>),
    Unique(Rc<SymCell>),
}

pub(crate) struct SymCell {
    description: Option<Rc<str>>,
    seq: u64,
}

thread_local! {
    static SYM_SEQ: Cell<u64> = const { Cell::new(0) };
}

fn next_sym_seq() -> u64 {
    SYM_SEQ.with(|c| {
        let n = c.get();
        c.set(n + 1);
        n
    })
}

impl Sym {
    /// Creates a fresh unique symbol with no description.
    pub fn new() -> Self {
        Sym(SymRepr::Unique(Rc::new(SymCell {
            description: None,
            seq: next_sym_seq(),
        })))
    }

    /// Creates a fresh unique symbol carrying a description.
    pub fn with_description(description: &str) -> Self {
        Sym(SymRepr::Unique(Rc::new(SymCell {
            description: Some(Rc::from(description)),
            seq: next_sym_seq(),
        })))
    }

    /// Returns the registered symbol for `name`.
    pub fn for_name(name: &str) -> Self {
        Sym(SymRepr::Registered(Rc::from(name)))
    }

    /// True for symbols produced by [`Sym::for_name`].
    pub fn is_registered(&self) -> bool {
        matches!(self.0, SymRepr::Registered(_))
    }

    /// The description of a unique symbol, or the name of a registered one.
    pub fn description(&self) -> Option<&str> {
        match &self.0 {
            SymRepr::Registered(name) => Some(name),
            SymRepr::Unique(cell) => cell.description.as_deref(),
        }
    }

    pub(crate) fn registered_name(&self) -> Option<Rc<str>> {
        match &self.0 {
            SymRepr::Registered(name) => Some(name.clone()),
            SymRepr::Unique(_) => None,
        }
    }

    /// The identity allocation backing a unique symbol.
    pub(crate) fn cell_identity(&self) -> Option<Rc<dyn Any>> {
        match &self.0 {
            SymRepr::Registered(_) => None,
            SymRepr::Unique(cell) => Some(cell.clone() as Rc<dyn Any>),
        }
    }

    /// Creation sequence number; orders unique symbols by first-seen.
    pub(crate) fn seq(&self) -> Option<u64> {
        match &self.0 {
            SymRepr::Registered(_) => None,
            SymRepr::Unique(cell) => Some(cell.seq),
        }
    }
}

impl Default for Sym {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Sym {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (SymRepr::Registered(a), SymRepr::Registered(b)) => a == b,
            (SymRepr::Unique(a), SymRepr::Unique(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Sym {}

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            SymRepr::Registered(name) => write!(f, "Sym({name:?})"),
            SymRepr::Unique(cell) => match &cell.description {
                Some(d) => write!(f, "Sym(#{} {d:?})", cell.seq),
                None => write!(f, "Sym(#{})", cell.seq),
            },
        }
    }
}

/// The two component categories of the interning engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    /// Compared by allocation address; held weakly by the trie.
    IdentityBearing,
    /// Compared by value; held strongly by the trie.
    Eternal,
}

/// Partitions a key component into identity-bearing vs eternal.
///
/// Registered symbols are names, not allocations, so they cannot be
/// held weakly and take the eternal branch.
pub fn classify(part: &KeyPart) -> Category {
    match part {
        KeyPart::Object(_) | KeyPart::Key(_) | KeyPart::Record(_) | KeyPart::Tuple(_) => {
            Category::IdentityBearing
        }
        KeyPart::Sym(sym) => {
            if sym.is_registered() {
                Category::Eternal
            } else {
                Category::IdentityBearing
            }
        }
        _ => Category::Eternal,
    }
}

const CANONICAL_NAN_BITS: u64 = 0x7ff8_0000_0000_0000;

/// SameValueZero bit canonicalization: one NaN, `-0.0` folded into `+0.0`.
pub(crate) fn canonical_float_bits(x: f64) -> u64 {
    if x.is_nan() {
        CANONICAL_NAN_BITS
    } else if x == 0.0 {
        0
    } else {
        x.to_bits()
    }
}

/// Strong child-map edge label for eternal components.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum EternalLabel {
    Unit,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Sym(Rc<str>),
}

/// The eternal label of a part, or `None` for identity-bearing parts.
pub(crate) fn eternal_label(part: &KeyPart) -> Option<EternalLabel> {
    match part {
        KeyPart::Unit => Some(EternalLabel::Unit),
        KeyPart::Bool(b) => Some(EternalLabel::Bool(*b)),
        KeyPart::Int(n) => Some(EternalLabel::Int(*n)),
        KeyPart::Float(x) => Some(EternalLabel::Float(canonical_float_bits(*x))),
        KeyPart::Str(s) => Some(EternalLabel::Str(s.clone())),
        KeyPart::Sym(sym) => sym.registered_name().map(EternalLabel::Sym),
        _ => None,
    }
}

/// Identity-bearing edge reference, compared by allocation address.
#[derive(Clone)]
pub(crate) struct IdentityRef(Rc<dyn Any>);

impl IdentityRef {
    pub(crate) fn new(rc: Rc<dyn Any>) -> Self {
        IdentityRef(rc)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }

    pub(crate) fn as_rc(&self) -> &Rc<dyn Any> {
        &self.0
    }
}

/// A classified, canonicalized component ready for the descent.
///
/// Nested keys, records, and tuples reduce to the identity of their
/// token allocation here, before the trie is borrowed; canonicalization
/// may itself intern (record and tuple keys are built lazily).
pub(crate) enum Canonical {
    Eternal(EternalLabel),
    Identity(IdentityRef),
}

impl Canonical {
    pub(crate) fn of(part: &KeyPart) -> Canonical {
        match part {
            KeyPart::Object(rc) => Canonical::Identity(IdentityRef::new(rc.clone())),
            KeyPart::Key(k) => Canonical::Identity(IdentityRef::new(k.token_any())),
            KeyPart::Record(r) => {
                Canonical::Identity(IdentityRef::new(r.canonical_key().token_any()))
            }
            KeyPart::Tuple(t) => {
                Canonical::Identity(IdentityRef::new(t.canonical_key().token_any()))
            }
            KeyPart::Sym(sym) => match sym.cell_identity() {
                Some(cell) => Canonical::Identity(IdentityRef::new(cell)),
                None => Canonical::Eternal(EternalLabel::Sym(
                    sym.registered_name()
                        .expect("non-unique symbol must be registered"),
                )),
            },
            _ => Canonical::Eternal(
                eternal_label(part).expect("non-identity part must have an eternal label"),
            ),
        }
    }
}
