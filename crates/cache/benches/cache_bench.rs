use std::sync::Arc;
use std::time::Duration;

use cache::{CacheLayer, MemoryStore, build_key};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Pagination, RecordFilter, RecordFormat};

fn bench_build_key(c: &mut Criterion) {
    let filter = RecordFilter::new()
        .search("kind of blue")
        .artist("Miles Davis")
        .format(RecordFormat::Vinyl)
        .category("Jazz");
    let pagination = Pagination::default();

    c.bench_function("cache/build_key", |b| {
        b.iter(|| build_key(&filter, &pagination));
    });
}

fn bench_memory_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let layer = CacheLayer::new(
        Arc::new(MemoryStore::new(1000).unwrap()),
        Duration::from_secs(60),
    );
    let payload: Vec<u64> = (0..100).collect();
    rt.block_on(layer.set_json("records:list:bench", &payload));

    c.bench_function("cache/memory_hit_100_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value: Option<Vec<u64>> = layer.get_json("records:list:bench").await;
                value.unwrap()
            })
        });
    });
}

fn bench_invalidate_all(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let layer = CacheLayer::new(
        Arc::new(MemoryStore::new(1000).unwrap()),
        Duration::from_secs(60),
    );

    c.bench_function("cache/invalidate_all_100_keys", |b| {
        b.iter(|| {
            rt.block_on(async {
                for i in 0..100 {
                    layer.set_json(&format!("records:list:{i}"), &i).await;
                }
                layer.invalidate_all("records:list:").await;
            })
        });
    });
}

criterion_group!(
    benches,
    bench_build_key,
    bench_memory_hit,
    bench_invalidate_all
);
criterion_main!(benches);
