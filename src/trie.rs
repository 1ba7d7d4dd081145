//! The interning trie: identity assignment over canonicalized
//! component sequences, token lifecycle, and reclamation.
//!
//! The descent runs two passes. The first walks GC nodes consuming only
//! identity-bearing components, so the nodes carrying the weak
//! reclamation signal are exactly those. If any eternal component was
//! skipped, the walk crosses the transition edge and a second pass
//! through eternal nodes consumes every component in position, with a
//! placeholder standing in where an identity was already consumed.
//! Length and position are therefore part of identity: no prefix
//! collapses onto another.

use crate::handle::CompositeKey;
use crate::node::{EdgeRef, EternalEdge, Node, NodeKey, NodeKind};
use crate::part::{Canonical, IdentityRef, KeyPart};
use slotmap::SlotMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Referent of an identity token. Unique by allocation; two composite
/// keys are structurally equal iff they hold the same `TokenInner`
/// allocation. Dropping the last handle runs the reclamation walk on
/// the terminal node.
pub(crate) struct TokenInner {
    trie: Weak<RefCell<TrieInner>>,
    node: NodeKey,
}

impl Drop for TokenInner {
    fn drop(&mut self) {
        let Some(trie) = self.trie.upgrade() else {
            return;
        };
        // Finalization is serialized with public operations: no trie
        // operation holds the borrow while user values can drop.
        let mut inner = trie
            .try_borrow_mut()
            .expect("token finalizer ran during an in-flight trie operation");
        inner.examine(self.node);
    }
}

pub(crate) struct TrieInner {
    nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
}

impl TrieInner {
    fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new_gc(None));
        TrieInner { nodes, root }
    }

    /// Descends the trie for `canon` and returns the terminal token.
    fn intern(&mut self, canon: &[Canonical], trie: Weak<RefCell<TrieInner>>) -> Rc<TokenInner> {
        let mut cur = self.root;
        let mut seen_eternal = false;

        // First pass: identity-bearing components only.
        for c in canon {
            match c {
                Canonical::Eternal(_) => seen_eternal = true,
                Canonical::Identity(idref) => cur = self.gc_child(cur, idref),
            }
        }

        // Second pass: all components in position, identities as
        // placeholders, reached through the transition edge.
        if seen_eternal {
            cur = self.transition_child(cur);
            for c in canon {
                let edge = match c {
                    Canonical::Eternal(label) => EternalEdge::Part(label.clone()),
                    Canonical::Identity(_) => EternalEdge::Placeholder,
                };
                cur = self.eternal_child(cur, edge);
            }
        }

        self.token_at(cur, trie)
    }

    fn gc_child(&mut self, cur: NodeKey, idref: &IdentityRef) -> NodeKey {
        let addr = idref.addr();
        match &self.nodes[cur].kind {
            NodeKind::Gc { children, .. } => {
                if let Some(&child) = children.get(idref.as_rc()) {
                    return child;
                }
            }
            NodeKind::Eternal { .. } => unreachable!("identity pass visited an eternal node"),
        }

        // A stale entry at a reused address must be purged, subtree and
        // all, before the fresh edge goes in.
        let stale = match &mut self.nodes[cur].kind {
            NodeKind::Gc { children, .. } => children.remove_addr(addr),
            NodeKind::Eternal { .. } => None,
        };
        if let Some(stale_child) = stale {
            self.remove_subtree(stale_child);
        }

        let child = self
            .nodes
            .insert(Node::new_gc(Some((cur, EdgeRef::Identity(addr)))));
        match &mut self.nodes[cur].kind {
            NodeKind::Gc { children, .. } => {
                children.insert(idref.as_rc(), child);
            }
            NodeKind::Eternal { .. } => unreachable!("identity pass visited an eternal node"),
        }
        child
    }

    fn transition_child(&mut self, cur: NodeKey) -> NodeKey {
        if let NodeKind::Gc {
            transition: Some(t),
            ..
        } = self.nodes[cur].kind
        {
            return t;
        }
        let child = self
            .nodes
            .insert(Node::new_eternal((cur, EdgeRef::Transition)));
        match &mut self.nodes[cur].kind {
            NodeKind::Gc { transition, .. } => *transition = Some(child),
            NodeKind::Eternal { .. } => unreachable!("transition edge out of an eternal node"),
        }
        child
    }

    fn eternal_child(&mut self, cur: NodeKey, edge: EternalEdge) -> NodeKey {
        match &self.nodes[cur].kind {
            NodeKind::Eternal { children } => {
                if let Some(&child) = children.get(&edge) {
                    return child;
                }
            }
            NodeKind::Gc { .. } => unreachable!("eternal pass visited an identity node"),
        }
        let child = self
            .nodes
            .insert(Node::new_eternal((cur, EdgeRef::Eternal(edge.clone()))));
        match &mut self.nodes[cur].kind {
            NodeKind::Eternal { children } => {
                children.insert(edge, child);
            }
            NodeKind::Gc { .. } => unreachable!("eternal pass visited an identity node"),
        }
        child
    }

    /// Returns the live token of a terminal node, minting a fresh one
    /// only when the previous token (if any) has been released.
    fn token_at(&mut self, cur: NodeKey, trie: Weak<RefCell<TrieInner>>) -> Rc<TokenInner> {
        if let Some(existing) = self.nodes[cur].token.as_ref().and_then(Weak::upgrade) {
            return existing;
        }
        let token = Rc::new(TokenInner { trie, node: cur });
        self.nodes[cur].token = Some(Rc::downgrade(&token));
        trace!(node = ?cur, "minted identity token");
        token
    }

    /// Upward reclamation walk: purge this node if it has neither
    /// children nor a live token, then re-examine the parent.
    pub(crate) fn examine(&mut self, start: NodeKey) {
        let mut key = start;
        let mut purged = 0usize;
        loop {
            let Some(node) = self.nodes.get(key) else {
                break;
            };
            if node.has_children() || node.has_live_token() {
                break;
            }
            let Some((parent, edge)) = node.parent.clone() else {
                break; // the root is never purged
            };
            self.nodes.remove(key);
            if let Some(p) = self.nodes.get_mut(parent) {
                p.remove_child(&edge);
            }
            purged += 1;
            key = parent;
        }
        if purged > 0 {
            trace!(purged, "purged trie nodes after token release");
        }
    }

    /// Post-order sweep: drop edges whose weak component key died
    /// (together with their whole subtree — such a subtree can never be
    /// matched again) and purge children left childless and tokenless.
    fn sweep(&mut self, key: NodeKey) -> usize {
        let mut removed = 0usize;

        enum Edge {
            Ident(usize, bool, NodeKey),
            Strong(EternalEdge, NodeKey),
            Transition(NodeKey),
        }
        let mut edges: Vec<Edge> = Vec::new();
        match &self.nodes[key].kind {
            NodeKind::Gc {
                children,
                transition,
            } => {
                edges.extend(
                    children
                        .iter()
                        .map(|(addr, alive, &child)| Edge::Ident(addr, alive, child)),
                );
                if let Some(t) = transition {
                    edges.push(Edge::Transition(*t));
                }
            }
            NodeKind::Eternal { children } => {
                edges.extend(
                    children
                        .iter()
                        .map(|(e, &child)| Edge::Strong(e.clone(), child)),
                );
            }
        }

        for edge in edges {
            match edge {
                Edge::Ident(addr, alive, child) => {
                    if !alive {
                        if let NodeKind::Gc { children, .. } = &mut self.nodes[key].kind {
                            children.remove_addr(addr);
                        }
                        removed += self.remove_subtree(child);
                        continue;
                    }
                    removed += self.sweep(child);
                    if self.purgeable(child) {
                        self.nodes.remove(child);
                        if let NodeKind::Gc { children, .. } = &mut self.nodes[key].kind {
                            children.remove_addr(addr);
                        }
                        removed += 1;
                    }
                }
                Edge::Strong(e, child) => {
                    removed += self.sweep(child);
                    if self.purgeable(child) {
                        self.nodes.remove(child);
                        if let NodeKind::Eternal { children } = &mut self.nodes[key].kind {
                            children.remove(&e);
                        }
                        removed += 1;
                    }
                }
                Edge::Transition(child) => {
                    removed += self.sweep(child);
                    if self.purgeable(child) {
                        self.nodes.remove(child);
                        if let NodeKind::Gc { transition, .. } = &mut self.nodes[key].kind {
                            *transition = None;
                        }
                        removed += 1;
                    }
                }
            }
        }

        removed
    }

    fn purgeable(&self, key: NodeKey) -> bool {
        self.nodes
            .get(key)
            .is_some_and(|n| !n.has_children() && !n.has_live_token())
    }

    fn remove_subtree(&mut self, key: NodeKey) -> usize {
        let Some(node) = self.nodes.remove(key) else {
            return 0;
        };
        let mut n = 1;
        for child in node.child_nodes() {
            n += self.remove_subtree(child);
        }
        n
    }
}

/// An interning trie with its own root.
///
/// The process-wide default registry behind [`composite_key`] gives the
/// usual shared behavior; separate registries exist for isolation
/// (structural equality never crosses registries, since tokens are
/// unique allocations).
pub struct KeyRegistry {
    inner: Rc<RefCell<TrieInner>>,
}

impl KeyRegistry {
    /// Creates a registry with a fresh root.
    pub fn new() -> Self {
        KeyRegistry {
            inner: Rc::new(RefCell::new(TrieInner::new())),
        }
    }

    /// Constructs a composite key from an ordered sequence of parts.
    ///
    /// Canonicalization (which may intern nested record/tuple keys)
    /// runs before the trie is borrowed.
    pub fn key<I>(&self, parts: I) -> CompositeKey
    where
        I: IntoIterator<Item = KeyPart>,
    {
        let parts: Vec<KeyPart> = parts.into_iter().collect();
        let canon: Vec<Canonical> = parts.iter().map(Canonical::of).collect();
        let token = {
            let mut inner = self.inner.borrow_mut();
            inner.intern(&canon, Rc::downgrade(&self.inner))
        };
        CompositeKey::from_token(token)
    }

    /// Sweeps edges stranded by component death. Token release already
    /// reclaims eagerly; this additionally clears dead weak edges whose
    /// shared ancestors were pinned by unrelated live state.
    pub fn collect(&self) {
        let mut inner = self.inner.borrow_mut();
        let root = inner.root;
        let removed = inner.sweep(root);
        trace!(removed, "collect swept dead entries");
    }

    /// Number of live trie nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static DEFAULT_REGISTRY: KeyRegistry = KeyRegistry::new();
}

/// Constructs a composite key against the default registry.
pub fn composite_key<I>(parts: I) -> CompositeKey
where
    I: IntoIterator<Item = KeyPart>,
{
    DEFAULT_REGISTRY.with(|r| r.key(parts))
}

/// Runs [`KeyRegistry::collect`] on the default registry.
pub fn collect() {
    DEFAULT_REGISTRY.with(KeyRegistry::collect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::KeyPart;
    use std::rc::Rc;

    /// Invariant: equal sequences share a token while a handle lives;
    /// unequal sequences never do.
    #[test]
    fn equal_sequences_share_token() {
        let reg = KeyRegistry::new();
        let a = reg.key([KeyPart::Int(1), KeyPart::from("x")]);
        let b = reg.key([KeyPart::Int(1), KeyPart::from("x")]);
        let c = reg.key([KeyPart::Int(2), KeyPart::from("x")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    /// Invariant: the empty sequence terminates at the root and all
    /// empty-sequence constructions share one token while it lives.
    #[test]
    fn empty_sequence_interns_at_root() {
        let reg = KeyRegistry::new();
        let baseline = reg.node_count();
        let a = reg.key(Vec::new());
        let b = reg.key(Vec::new());
        assert_eq!(a, b);
        assert_eq!(reg.node_count(), baseline, "no nodes created for []");
    }

    /// Invariant: mixed sequences separate identity and eternal passes
    /// but preserve position — permuting categories changes the key.
    #[test]
    fn mixed_positions_are_distinct() {
        let reg = KeyRegistry::new();
        let obj: Rc<dyn std::any::Any> = Rc::new(0u8);
        let a = reg.key([KeyPart::Object(obj.clone()), KeyPart::Int(1)]);
        let b = reg.key([KeyPart::Int(1), KeyPart::Object(obj.clone())]);
        let a2 = reg.key([KeyPart::Object(obj.clone()), KeyPart::Int(1)]);
        assert_eq!(a, a2);
        assert_ne!(a, b);
    }

    /// Invariant: dropping the last handle cascades the purge back to
    /// the root; re-interning the same sequence then mints fresh state.
    #[test]
    fn token_release_purges_to_baseline() {
        let reg = KeyRegistry::new();
        let baseline = reg.node_count();
        let k = reg.key([KeyPart::Int(1), KeyPart::Int(2)]);
        assert!(reg.node_count() > baseline);
        drop(k);
        assert_eq!(reg.node_count(), baseline);

        // Fresh state after the purge still interns correctly.
        let k1 = reg.key([KeyPart::Int(1), KeyPart::Int(2)]);
        let k2 = reg.key([KeyPart::Int(1), KeyPart::Int(2)]);
        assert_eq!(k1, k2);
    }

    /// Invariant: a dead component edge strands its subtree until
    /// `collect`, which removes it even while the token stays valid for
    /// equality on outstanding handles.
    #[test]
    fn collect_sweeps_dead_component_edges() {
        let reg = KeyRegistry::new();
        let baseline = reg.node_count();
        let obj: Rc<dyn std::any::Any> = Rc::new(3u32);
        let k = reg.key([KeyPart::Object(obj.clone()), KeyPart::Int(9)]);
        drop(obj);
        assert!(reg.node_count() > baseline);

        reg.collect();
        assert_eq!(reg.node_count(), baseline);
        // The handle still equals itself by token identity.
        assert_eq!(k, k.clone());
    }
}
