use std::sync::Arc;
use std::thread;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use flightcache::builder::CacheBuilder;
use flightcache::policy::{PolicyKind, TwoQueuePolicy};
use flightcache::traits::EvictionPolicy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn key_stream(len: usize, universe: u64) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..len).map(|_| rng.gen_range(0..universe)).collect()
}

fn bench_get_fresh_hit(c: &mut Criterion) {
    let cache = CacheBuilder::new(1024)
        .build(|key: &u64| Ok::<_, ()>(Arc::new(*key)))
        .unwrap();
    for key in 0..1024u64 {
        cache.get(&key).unwrap();
    }
    let keys = key_stream(4096, 1024);

    c.bench_function("get_fresh_hit", |b| {
        b.iter(|| {
            for key in &keys {
                let _ = std::hint::black_box(cache.get(std::hint::black_box(key)));
            }
        })
    });
}

fn bench_get_miss_churn(c: &mut Criterion) {
    let keys = key_stream(4096, 16_384);
    c.bench_function("get_miss_churn", |b| {
        b.iter_batched(
            || {
                CacheBuilder::new(1024)
                    .build(|key: &u64| Ok::<_, ()>(*key))
                    .unwrap()
            },
            |cache| {
                for key in &keys {
                    let _ = std::hint::black_box(cache.get(key));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_contended(c: &mut Criterion) {
    let cache = Arc::new(
        CacheBuilder::new(256)
            .policy(PolicyKind::TwoQueue)
            .build(|key: &u64| Ok::<_, ()>(*key))
            .unwrap(),
    );
    let keys = Arc::new(key_stream(1024, 512));

    c.bench_function("get_contended_4_threads", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let cache = Arc::clone(&cache);
                    let keys = Arc::clone(&keys);
                    thread::spawn(move || {
                        for key in keys.iter() {
                            let _ = std::hint::black_box(cache.get(key));
                        }
                    })
                })
                .collect();
            for handle in handles {
                let _ = handle.join();
            }
        })
    });
}

fn bench_two_queue_admit_evict(c: &mut Criterion) {
    let keys = key_stream(4096, 8192);
    c.bench_function("two_queue_admit_evict", |b| {
        b.iter_batched(
            || TwoQueuePolicy::<u64>::new(1024),
            |mut policy| {
                for &key in &keys {
                    if policy.touch(&key) {
                        continue;
                    }
                    if policy.is_full() {
                        let _ = std::hint::black_box(policy.pop_victim());
                    }
                    policy.admit(key);
                }
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_get_fresh_hit,
    bench_get_miss_churn,
    bench_get_contended,
    bench_two_queue_admit_evict
);
criterion_main!(benches);
