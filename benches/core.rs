use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use assetcore::{AllocCategory, AssetContext, CoreConfig, LoaderConfig, TaskPriority};
use bumpalo::Bump;
use std::alloc::{alloc, dealloc, Layout};

// =============================================================================
// ALLOCATOR
// =============================================================================

fn bench_tracked_alloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracked_alloc");

    for size in [64usize, 1024, 16 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("assetcore", size), &size, |b, &size| {
            let ctx = AssetContext::new(CoreConfig::default());
            let memory = ctx.memory().clone();
            b.iter(|| unsafe {
                let ptr = memory.alloc(AllocCategory::General, size, 16);
                black_box(ptr);
                memory.free(AllocCategory::General, ptr);
            });
        });

        group.bench_with_input(BenchmarkId::new("system_malloc", size), &size, |b, &size| {
            let layout = Layout::from_size_align(size, 16).unwrap();
            b.iter(|| unsafe {
                let ptr = alloc(layout);
                black_box(ptr);
                dealloc(ptr, layout);
            });
        });
    }

    group.finish();
}

fn bench_linear_arena(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_1000x64B");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("assetcore", |b| {
        let ctx = AssetContext::new(CoreConfig::default());
        let mut arena = ctx.memory().linear(AllocCategory::Temporary, 128 * 1024).unwrap();
        b.iter(|| {
            for _ in 0..1000 {
                black_box(arena.alloc::<[u8; 64]>());
            }
            arena.reset();
        });
    });

    group.bench_function("bumpalo", |b| {
        let mut bump = Bump::with_capacity(128 * 1024);
        b.iter(|| {
            for _ in 0..1000 {
                black_box(bump.alloc([0u8; 64]));
            }
            bump.reset();
        });
    });

    group.finish();
}

// =============================================================================
// REGISTRY
// =============================================================================

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    group.bench_function("acquire_release", |b| {
        let ctx = AssetContext::new(CoreConfig::default());
        let registry = ctx.registry().clone();
        let _keep = registry.create("bench/texture", [0u8; 64], 64, |_| {});
        b.iter(|| {
            let handle = registry.acquire(black_box("bench/texture")).unwrap();
            registry.release(handle);
        });
    });

    group.bench_function("create_destroy", |b| {
        let ctx = AssetContext::new(CoreConfig::default());
        let registry = ctx.registry().clone();
        b.iter(|| {
            let handle = registry.create("bench/transient", 0u64, 8, |_| {});
            black_box(&handle);
            drop(handle);
        });
    });

    group.finish();
}

// =============================================================================
// LOADER
// =============================================================================

fn bench_loader_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("loader");
    group.throughput(Throughput::Elements(100));

    for workers in [1usize, 4] {
        group.bench_with_input(
            BenchmarkId::new("custom_x100", workers),
            &workers,
            |b, &workers| {
                let ctx = AssetContext::new(CoreConfig::default());
                let loader = ctx
                    .spawn_loader_with(LoaderConfig::default().with_workers(workers))
                    .unwrap();
                b.iter(|| {
                    let tasks: Vec<_> = (0..100u64)
                        .map(|i| {
                            loader
                                .submit_custom(move || Ok(i * 2), TaskPriority::Normal, None)
                                .unwrap()
                        })
                        .collect();
                    for task in tasks {
                        loader.wait_for_task(&task, None);
                        loader.free_task(task).unwrap();
                    }
                    loader.process_completed(0);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_tracked_alloc,
    bench_linear_arena,
    bench_registry,
    bench_loader_round_trip,
);
criterion_main!(benches);
