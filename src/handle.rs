//! The user-visible composite key handle and the projection protocol.

use crate::part::KeyPart;
use crate::trie::{composite_key, TokenInner};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A composite key: an ordered sequence of values under structural
/// equality.
///
/// The handle is opaque. Its only state is a strong reference to the
/// identity token minted at the terminal trie node; two handles are
/// equal iff their tokens are the same allocation, which is exactly
/// structural equality of the input sequences. The token field is
/// crate-private, so handles cannot be forged.
///
/// Cloning shares the token. Dropping the last handle for a token
/// releases it and lets the trie reclaim the interning state.
#[derive(Clone)]
pub struct CompositeKey {
    token: Rc<TokenInner>,
}

impl CompositeKey {
    /// Constructs a key from `parts` against the default registry.
    pub fn new<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = KeyPart>,
    {
        composite_key(parts)
    }

    /// Structural equality: true iff both handles hold the same token.
    pub fn equal(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.token, &b.token)
    }

    pub(crate) fn from_token(token: Rc<TokenInner>) -> Self {
        CompositeKey { token }
    }

    /// The token allocation as an identity-bearing value, for use as a
    /// trie edge when this key nests inside another.
    pub(crate) fn token_any(&self) -> Rc<dyn Any> {
        self.token.clone()
    }

    pub(crate) fn token_addr(&self) -> usize {
        Rc::as_ptr(&self.token) as usize
    }
}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        Self::equal(self, other)
    }
}

impl Eq for CompositeKey {}

impl Hash for CompositeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.token_addr());
    }
}

impl fmt::Debug for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeKey").finish_non_exhaustive()
    }
}

/// Projection protocol: a value that can present a canonical composite
/// key to a structural container.
pub trait Keyed {
    /// Returns the canonical key for this value.
    fn canonical_key(&self) -> CompositeKey;
}

impl Keyed for CompositeKey {
    fn canonical_key(&self) -> CompositeKey {
        self.clone()
    }
}

/// Reduces a part that implements the projection protocol to its
/// canonical key; every other part is returned unchanged.
pub fn canonicalize(part: KeyPart) -> KeyPart {
    match part {
        KeyPart::Record(r) => KeyPart::Key(r.canonical_key()),
        KeyPart::Tuple(t) => KeyPart::Key(t.canonical_key()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: a handle projects to itself.
    #[test]
    fn key_projects_to_itself() {
        let k = CompositeKey::new([KeyPart::Int(1)]);
        assert_eq!(k.canonical_key(), k);
    }

    /// Invariant: `==`, `equal`, and `Hash` all follow token identity.
    #[test]
    fn equality_and_hash_follow_token() {
        use std::collections::hash_map::DefaultHasher;

        let a = CompositeKey::new([KeyPart::Int(1), KeyPart::Int(2)]);
        let b = CompositeKey::new([KeyPart::Int(1), KeyPart::Int(2)]);
        assert!(CompositeKey::equal(&a, &b));
        assert_eq!(a, b);

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    /// Invariant: the debug form is opaque.
    #[test]
    fn debug_is_opaque() {
        let k = CompositeKey::new([KeyPart::Int(1)]);
        assert_eq!(format!("{k:?}"), "CompositeKey { .. }");
    }
}
