// Reclamation suite: interning state is bounded by what user code can
// still observe.
//
// Invariants exercised (against isolated registries so node counts are
// exact):
// - Dropping the last handle for a key cascades the purge back to the
//   root; node_count returns to its pre-construction value.
// - Nodes shared by several keys survive until every dependent key's
//   handle is gone.
// - Component death strands edges that `collect` sweeps, without
//   invalidating outstanding handles.
// - While a handle lives, the chain pinning its token stays intact.
use composite_key::{CompositeKey, KeyPart, KeyRegistry};
use std::rc::Rc;

// Dropping the only handle reclaims everything the key allocated, for
// eternal, identity-bearing, and mixed sequences alike.
#[test]
fn drop_last_handle_restores_baseline() {
    let reg = KeyRegistry::new();
    let baseline = reg.node_count();

    let obj = Rc::new(1u8);
    let cases: Vec<CompositeKey> = vec![
        reg.key([KeyPart::Int(1), KeyPart::Int(2)]),
        reg.key([KeyPart::object(obj.clone()), KeyPart::object(obj.clone())]),
        reg.key([KeyPart::object(obj.clone()), KeyPart::from("mix")]),
        reg.key(Vec::new()),
    ];
    assert!(reg.node_count() > baseline);

    drop(cases);
    assert_eq!(reg.node_count(), baseline);
}

// A shared prefix node survives as long as any key below it is live.
#[test]
fn shared_prefix_survives_sibling_drop() {
    let reg = KeyRegistry::new();
    let baseline = reg.node_count();
    let a = Rc::new(0u8);

    let kb = reg.key([KeyPart::object(a.clone()), KeyPart::from("b")]);
    let kc = reg.key([KeyPart::object(a.clone()), KeyPart::from("c")]);
    let after_both = reg.node_count();

    drop(kb);
    let after_one = reg.node_count();
    assert!(after_one < after_both);
    assert!(after_one > baseline);

    // The surviving key still reconstructs to the same token.
    let kc2 = reg.key([KeyPart::object(a.clone()), KeyPart::from("c")]);
    assert_eq!(kc, kc2);

    drop((kc, kc2));
    assert_eq!(reg.node_count(), baseline);
}

// Clones pin the token: the entry survives until the last clone drops.
#[test]
fn clones_keep_state_alive() {
    let reg = KeyRegistry::new();
    let baseline = reg.node_count();

    let k = reg.key([KeyPart::Int(9)]);
    let c1 = k.clone();
    let c2 = c1.clone();
    drop(k);
    drop(c1);
    assert!(reg.node_count() > baseline);
    drop(c2);
    assert_eq!(reg.node_count(), baseline);
}

// Component death: once every identity-bearing component of a key is
// gone, `collect` reclaims the interning state even while a handle is
// still outstanding; the handle keeps comparing by its token.
#[test]
fn collect_reclaims_after_component_death() {
    let reg = KeyRegistry::new();
    let baseline = reg.node_count();

    let obj = Rc::new(7i64);
    let k = reg.key([KeyPart::object(obj.clone()), KeyPart::Int(1)]);
    drop(obj);

    assert!(reg.node_count() > baseline);
    reg.collect();
    assert_eq!(reg.node_count(), baseline);

    assert_eq!(k, k.clone());
}

// Dead-component edges on a shared prefix are swept without touching
// live siblings.
#[test]
fn collect_spares_live_siblings() {
    let reg = KeyRegistry::new();
    let a = Rc::new(1u8);
    let b = Rc::new(2u8);

    let ka = reg.key([KeyPart::object(a.clone())]);
    let kb = reg.key([KeyPart::object(b.clone())]);
    let before = reg.node_count();

    drop(b);
    drop(kb);
    reg.collect();
    assert!(reg.node_count() < before);

    let ka2 = reg.key([KeyPart::object(a.clone())]);
    assert_eq!(ka, ka2);
}

// collect is idempotent and a no-op on a fully live trie.
#[test]
fn collect_is_idempotent() {
    let reg = KeyRegistry::new();
    let obj = Rc::new(0u8);
    let _k = reg.key([KeyPart::object(obj.clone()), KeyPart::Int(5)]);

    let before = reg.node_count();
    reg.collect();
    assert_eq!(reg.node_count(), before);
    reg.collect();
    assert_eq!(reg.node_count(), before);
}

// After full reclamation the registry is fresh: re-interning an old
// sequence works and yields a self-consistent key.
#[test]
fn reuse_after_reclamation() {
    let reg = KeyRegistry::new();
    let baseline = reg.node_count();

    let k1 = reg.key([KeyPart::from("gone"), KeyPart::Int(3)]);
    drop(k1);
    assert_eq!(reg.node_count(), baseline);

    let k2 = reg.key([KeyPart::from("gone"), KeyPart::Int(3)]);
    let k3 = reg.key([KeyPart::from("gone"), KeyPart::Int(3)]);
    assert_eq!(k2, k3);
}

// Nested keys: the outer key holds the inner token alive through the
// trie edge only weakly; dropping the inner handle alone must not
// break the outer key, and dropping both reclaims everything.
#[test]
fn nested_key_reclamation() {
    let reg = KeyRegistry::new();
    let baseline = reg.node_count();

    let inner = reg.key([KeyPart::Int(1)]);
    let outer = reg.key([KeyPart::Int(2), KeyPart::Key(inner.clone())]);

    drop(inner);
    assert_eq!(outer, outer.clone());

    drop(outer);
    reg.collect();
    assert_eq!(reg.node_count(), baseline);
}
