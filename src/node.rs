//! Trie nodes: one position in the interning trie.
//!
//! Nodes come in two kinds. A GC node's children are keyed by
//! identity-bearing components and held weakly; an eternal node's
//! children are keyed by eternal labels and held strongly. A node owns
//! its children through these maps and knows how its parent reached it,
//! so the purge cascade can unlink it from below.

use crate::part::EternalLabel;
use crate::trie::TokenInner;
use crate::weak_map::CountingWeakMap;
use hashbrown::HashMap;
use slotmap::new_key_type;
use std::any::Any;
use std::rc::Weak;

new_key_type! {
    /// Generational arena key for trie nodes. Stale keys (held by
    /// tokens whose subtree was swept) resolve to `None` instead of
    /// aliasing a reused slot.
    pub(crate) struct NodeKey;
}

/// Child edge label inside an eternal node. `Placeholder` occupies the
/// positions of identity-bearing components on the second descent pass,
/// preserving length and position.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum EternalEdge {
    Part(EternalLabel),
    Placeholder,
}

/// How a parent reaches a child: the edge label seen from the parent.
#[derive(Clone, Debug)]
pub(crate) enum EdgeRef {
    Identity(usize),
    Eternal(EternalEdge),
    Transition,
}

pub(crate) enum NodeKind {
    Gc {
        children: CountingWeakMap<dyn Any, NodeKey>,
        /// Dedicated edge into the eternal sub-trie.
        transition: Option<NodeKey>,
    },
    Eternal {
        children: HashMap<EternalEdge, NodeKey>,
    },
}

pub(crate) struct Node {
    pub(crate) parent: Option<(NodeKey, EdgeRef)>,
    /// At most one identity token, held weakly; minted on first
    /// terminal visit and never re-minted while the previous one lives.
    pub(crate) token: Option<Weak<TokenInner>>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new_gc(parent: Option<(NodeKey, EdgeRef)>) -> Self {
        Node {
            parent,
            token: None,
            kind: NodeKind::Gc {
                children: CountingWeakMap::new(),
                transition: None,
            },
        }
    }

    pub(crate) fn new_eternal(parent: (NodeKey, EdgeRef)) -> Self {
        Node {
            parent: Some(parent),
            token: None,
            kind: NodeKind::Eternal {
                children: HashMap::new(),
            },
        }
    }

    /// Counts every child entry, dead-not-yet-swept weak entries
    /// included. Conservative: a dead edge is removed by the sweep,
    /// which re-examines this node.
    pub(crate) fn has_children(&self) -> bool {
        match &self.kind {
            NodeKind::Gc {
                children,
                transition,
            } => transition.is_some() || children.total_len() > 0,
            NodeKind::Eternal { children } => !children.is_empty(),
        }
    }

    pub(crate) fn has_live_token(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|w| w.strong_count() > 0)
    }

    /// Unlinks the child reached via `edge` from this node's maps.
    pub(crate) fn remove_child(&mut self, edge: &EdgeRef) {
        match (&mut self.kind, edge) {
            (NodeKind::Gc { children, .. }, EdgeRef::Identity(addr)) => {
                children.remove_addr(*addr);
            }
            (NodeKind::Gc { transition, .. }, EdgeRef::Transition) => {
                *transition = None;
            }
            (NodeKind::Eternal { children }, EdgeRef::Eternal(e)) => {
                children.remove(e);
            }
            _ => unreachable!("edge kind does not match the parent node kind"),
        }
    }

    /// All child node keys, for subtree removal.
    pub(crate) fn child_nodes(&self) -> Vec<NodeKey> {
        match &self.kind {
            NodeKind::Gc {
                children,
                transition,
            } => {
                let mut out: Vec<NodeKey> = children.iter().map(|(_, _, &c)| c).collect();
                if let Some(t) = transition {
                    out.push(*t);
                }
                out
            }
            NodeKind::Eternal { children } => children.values().copied().collect(),
        }
    }
}
