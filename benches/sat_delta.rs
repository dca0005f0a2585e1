//! Benchmarks for the sat-delta metric and nearest-K retrieval.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use grulia::expr::{Constant, Expr, Variable};
use grulia::metric::{self, DEFAULT_REFERENCE_VALUES};
use grulia::solution::Model;
use grulia::store::{CacheEntry, KeyStore};

fn random_conjunction(rng: &mut StdRng, clauses: usize) -> Expr {
    Expr::conjunction((0..clauses).map(|i| {
        let v = Expr::var(Variable::int(format!("v{}", i % 8), -1000, 1000));
        let c = Expr::int(rng.gen_range(-500..=500));
        if rng.gen_range(0..2) == 0 {
            Expr::lt(v, c)
        } else {
            Expr::gt(v, c)
        }
    }))
    .unwrap_or_else(|| Expr::int(0))
}

fn bench_compute(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let expr = random_conjunction(&mut rng, 32);

    c.bench_function("sat_delta_32_clauses", |bench| {
        bench.iter(|| black_box(metric::compute(&expr, &DEFAULT_REFERENCE_VALUES).unwrap()))
    });
}

fn bench_canonical(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let clauses: Vec<Expr> = random_conjunction(&mut rng, 32).conjuncts();

    c.bench_function("canonical_32_clauses", |bench| {
        bench.iter(|| {
            let fresh = Expr::conjunction(clauses.iter().cloned()).unwrap_or_else(|| Expr::int(0));
            black_box(fresh.canonical().len())
        })
    });
}

fn bench_nearest(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let store = KeyStore::<Model>::new();
    for i in 0..10_000 {
        let size = rng.gen_range(1..=8);
        let model: Model = (0..size)
            .map(|j| (Variable::int(format!("v{j}"), -10, 10), Constant::Int(i % 21 - 10)))
            .collect();
        store.insert(CacheEntry::new(rng.gen_range(0.0..5000.0), size, model));
    }

    c.bench_function("nearest_10_of_10k", |bench| {
        bench.iter(|| black_box(store.nearest(black_box(2500.0), 10, Some(4)).len()))
    });
}

criterion_group!(benches, bench_compute, bench_canonical, bench_nearest);
criterion_main!(benches);
