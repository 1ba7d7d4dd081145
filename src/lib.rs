//! composite-key: structural (value-based) equality over composite keys.
//!
//! A [`CompositeKey`] is built from an ordered sequence of heterogeneous
//! [`KeyPart`]s; two keys built from equal sequences compare equal even
//! though they are distinct handles. Identity is assigned by a shared
//! interning trie whose state is reclaimed deterministically: dropping
//! the last handle for a key releases its token and purges the nodes it
//! pinned, and dropping a key's identity-bearing components lets
//! [`collect`] sweep the edges they keyed.
//!
//! [`KeyedMap`] and [`KeyedSet`] put this to work as containers with a
//! caller-supplied projection, and [`Record`]/[`Tuple`] are frozen
//! aggregates that compare structurally through their canonical key.
//!
//! ```
//! use composite_key::{composite_key, CompositeKey, KeyPart};
//!
//! let a = composite_key([KeyPart::from(0), KeyPart::from("x")]);
//! let b = composite_key([KeyPart::from(0), KeyPart::from("x")]);
//! assert!(CompositeKey::equal(&a, &b));
//! ```

mod error;
mod handle;
mod map;
mod node;
mod part;
mod record;
mod set;
mod trie;
mod weak_map;

pub use error::{Error, Result};
pub use handle::{canonicalize, CompositeKey, Keyed};
pub use map::KeyedMap;
pub use part::{classify, Category, KeyPart, Sym};
pub use record::{Record, RecordKey, Tuple};
pub use set::KeyedSet;
pub use trie::{collect, composite_key, KeyRegistry};
pub use weak_map::CountingWeakMap;
