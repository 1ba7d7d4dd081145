use composite_key::{CompositeKey, KeyPart, KeyRegistry};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::rc::Rc;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn pair_parts(x: u64) -> [KeyPart; 2] {
    [
        KeyPart::Int((x >> 32) as i64),
        KeyPart::Int((x & 0xffff_ffff) as i64),
    ]
}

fn bench_intern_fresh_10k(c: &mut Criterion) {
    c.bench_function("intern::fresh_pairs_10k", |b| {
        b.iter_batched(
            KeyRegistry::new,
            |reg| {
                let mut keys = Vec::with_capacity(10_000);
                for x in lcg(1).take(10_000) {
                    keys.push(reg.key(pair_parts(x)));
                }
                black_box((reg, keys))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_intern_warm_10k(c: &mut Criterion) {
    // Re-interning sequences whose tokens are pinned by live handles:
    // pure descent plus a weak upgrade, no minting.
    c.bench_function("intern::warm_pairs_10k", |b| {
        b.iter_batched(
            || {
                let reg = KeyRegistry::new();
                let keys: Vec<CompositeKey> =
                    lcg(2).take(10_000).map(|x| reg.key(pair_parts(x))).collect();
                (reg, keys)
            },
            |(reg, keys)| {
                let mut out = Vec::with_capacity(10_000);
                for x in lcg(2).take(10_000) {
                    out.push(reg.key(pair_parts(x)));
                }
                black_box((reg, keys, out))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_intern_objects_10k(c: &mut Criterion) {
    // Identity-bearing components exercise the weak-map branch.
    c.bench_function("intern::object_pairs_10k", |b| {
        b.iter_batched(
            || {
                let reg = KeyRegistry::new();
                let objects: Vec<Rc<u64>> = lcg(3).take(100).map(Rc::new).collect();
                (reg, objects)
            },
            |(reg, objects)| {
                let mut keys = Vec::with_capacity(10_000);
                for x in lcg(4).take(10_000) {
                    let a = &objects[(x % 100) as usize];
                    let b = &objects[((x >> 8) % 100) as usize];
                    keys.push(reg.key([KeyPart::object(a.clone()), KeyPart::object(b.clone())]));
                }
                black_box((reg, objects, keys))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_drop_cascade_10k(c: &mut Criterion) {
    // Dropping distinct keys runs the purge cascade per key.
    c.bench_function("intern::drop_cascade_10k", |b| {
        b.iter_batched(
            || {
                let reg = KeyRegistry::new();
                let keys: Vec<CompositeKey> =
                    lcg(5).take(10_000).map(|x| reg.key(pair_parts(x))).collect();
                (reg, keys)
            },
            |(reg, keys)| {
                drop(keys);
                black_box(reg)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_nested_keys_10k(c: &mut Criterion) {
    c.bench_function("intern::nested_10k", |b| {
        b.iter_batched(
            || {
                let reg = KeyRegistry::new();
                let inner = reg.key([KeyPart::Int(1), KeyPart::Int(2)]);
                (reg, inner)
            },
            |(reg, inner)| {
                let mut keys = Vec::with_capacity(10_000);
                for x in lcg(6).take(10_000) {
                    keys.push(reg.key([
                        KeyPart::Int(x as i64),
                        KeyPart::Key(inner.clone()),
                    ]));
                }
                black_box((reg, inner, keys))
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_intern_fresh_10k,
    bench_intern_warm_10k,
    bench_intern_objects_10k,
    bench_drop_cascade_10k,
    bench_nested_keys_10k
);
criterion_main!(benches);
