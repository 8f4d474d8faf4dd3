//! Service container resolution paths.
//!
//! ```bash
//! cargo bench --package bedrock-di
//! ```

use bedrock_core::{Interface, Result};
use bedrock_di::ServiceContainer;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

trait Counter: Interface {
    fn value(&self) -> u64;
}

struct Fixed(u64);

impl Counter for Fixed {
    fn value(&self) -> u64 {
        self.0
    }
}

fn build(_: &ServiceContainer) -> Result<Arc<dyn Counter>> {
    Ok(Arc::new(Fixed(7)))
}

fn benchmark_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    let container = ServiceContainer::new();
    container
        .register_instance::<dyn Counter>(Arc::new(Fixed(1)))
        .expect("instance registration");
    group.bench_function("instance", |b| {
        b.iter(|| black_box(container.resolve::<dyn Counter>()).map(|c| c.value()));
    });

    let container = ServiceContainer::new();
    container
        .register_singleton::<dyn Counter, _>(build)
        .expect("singleton registration");
    group.bench_function("singleton/cached", |b| {
        b.iter(|| black_box(container.resolve::<dyn Counter>()).map(|c| c.value()));
    });

    let container = ServiceContainer::new();
    container
        .register_transient::<dyn Counter, _>(build)
        .expect("transient registration");
    group.bench_function("transient", |b| {
        b.iter(|| black_box(container.resolve::<dyn Counter>()).map(|c| c.value()));
    });

    let container = ServiceContainer::new();
    group.bench_function("missing", |b| {
        b.iter(|| black_box(container.try_resolve::<dyn Counter>()).is_none());
    });

    group.finish();
}

criterion_group!(benches, benchmark_resolve);
criterion_main!(benches);
