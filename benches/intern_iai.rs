use composite_key::{CompositeKey, KeyPart, KeyRegistry};

fn iai_intern_single_pair() -> CompositeKey {
    let reg = KeyRegistry::new();
    reg.key([KeyPart::Int(1), KeyPart::Int(2)])
}

fn iai_intern_warm_pair() -> bool {
    let reg = KeyRegistry::new();
    let first = reg.key([KeyPart::Int(1), KeyPart::Int(2)]);
    let second = reg.key([KeyPart::Int(1), KeyPart::Int(2)]);
    CompositeKey::equal(&first, &second)
}

fn iai_intern_and_drop_100() -> usize {
    let reg = KeyRegistry::new();
    for i in 0..100i64 {
        let _k = reg.key([KeyPart::Int(i), KeyPart::Int(i + 1)]);
    }
    reg.node_count()
}

iai::main!(
    iai_intern_single_pair,
    iai_intern_warm_pair,
    iai_intern_and_drop_100
);
