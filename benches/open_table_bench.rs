use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use recency_cache::OpenAddressTable;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn pick(n: usize, count: usize) -> Vec<usize> {
    let mut s = 0x9e3779b97f4a7c15u64;
    (0..count)
        .map(|_| {
            s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
            (s as usize) % n
        })
        .collect()
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("table::insert_fresh_100k", |b| {
        b.iter_batched(
            OpenAddressTable::<String, u64>::new,
            |mut t| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    let _ = t.insert(key(x), i as u64).unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_reserved_100k(c: &mut Criterion) {
    c.bench_function("table::insert_reserved_100k", |b| {
        b.iter_batched(
            || {
                let mut t = OpenAddressTable::<String, u64>::new();
                t.reserve(1 << 18);
                t
            },
            |mut t| {
                for (i, x) in lcg(3).take(100_000).enumerate() {
                    let _ = t.insert(key(x), i as u64).unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_erase_random_10k(c: &mut Criterion) {
    c.bench_function("table::erase_random_10k_of_110k", |b| {
        b.iter_batched(
            || {
                let mut t = OpenAddressTable::new();
                let keys: Vec<String> = lcg(5).take(110_000).map(key).collect();
                for (i, k) in keys.iter().enumerate() {
                    let _ = t.insert(k.clone(), i as u64).unwrap();
                }
                let victims: Vec<String> = pick(keys.len(), 10_000)
                    .into_iter()
                    .map(|i| keys[i].clone())
                    .collect();
                (t, victims)
            },
            |(mut t, victims)| {
                for k in &victims {
                    t.erase(k);
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find_hit_10k(c: &mut Criterion) {
    c.bench_function("table::find_hit_10k_on_100k", |b| {
        let mut t = OpenAddressTable::new();
        let keys: Vec<_> = lcg(7).take(100_000).map(key).collect();
        for (i, k) in keys.iter().enumerate() {
            let _ = t.insert(k.clone(), i as u64).unwrap();
        }
        let queries: Vec<String> = pick(keys.len(), 10_000)
            .into_iter()
            .map(|i| keys[i].clone())
            .collect();
        b.iter(|| {
            for k in &queries {
                black_box(t.find(k));
            }
        })
    });
}

fn bench_find_miss_10k(c: &mut Criterion) {
    c.bench_function("table::find_miss_10k_on_100k", |b| {
        let mut t = OpenAddressTable::new();
        for (i, x) in lcg(11).take(100_000).enumerate() {
            let _ = t.insert(key(x), i as u64).unwrap();
        }
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            for _ in 0..10_000 {
                let k = key(miss.next().unwrap());
                black_box(t.find(&k));
            }
        })
    });
}

// Steady-state insert/erase at a fixed live count; exercises tombstone reuse
// and same-capacity purges.
fn bench_churn_fixed_live(c: &mut Criterion) {
    c.bench_function("table::churn_100k_at_1k_live", |b| {
        b.iter_batched(
            || {
                let mut t = OpenAddressTable::new();
                let keys: Vec<String> = lcg(13).take(101_000).map(key).collect();
                for k in &keys[..1_000] {
                    let _ = t.insert(k.clone(), 0u64).unwrap();
                }
                (t, keys)
            },
            |(mut t, keys)| {
                for i in 1_000..keys.len() {
                    t.erase(&keys[i - 1_000]);
                    let _ = t.insert(keys[i].clone(), i as u64).unwrap();
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iter_all(c: &mut Criterion) {
    c.bench_function("table::iter_all_100k", |b| {
        let mut t = OpenAddressTable::new();
        for (i, x) in lcg(999).take(100_000).enumerate() {
            let _ = t.insert(key(x), i as u64).unwrap();
        }
        b.iter(|| {
            let mut sum = 0u64;
            for (_k, v) in t.iter() {
                sum = sum.wrapping_add(*v);
            }
            black_box(sum)
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert_fresh_100k, bench_insert_reserved_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_erase_random_10k,
              bench_find_hit_10k,
              bench_find_miss_10k,
              bench_churn_fixed_live,
              bench_iter_all
}
criterion_main!(benches_insert, benches_ops);
