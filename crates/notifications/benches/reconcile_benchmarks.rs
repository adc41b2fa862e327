use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use fogon_auth::{Role, UserAccount};
use fogon_core::{NotificationId, ProductId, UserId};
use fogon_inventory::{NewProduct, Product};
use fogon_notifications::{Notification, reconcile};

fn catalog(size: usize) -> Vec<Product> {
    (0..size)
        .map(|i| {
            Product::create(
                ProductId::new(),
                NewProduct {
                    name: format!("item-{i}"),
                    // three in eight products sit at or under the threshold
                    quantity: (i % 8) as u32,
                    price_cents: 100,
                    threshold: 2,
                    description: None,
                },
            )
            .unwrap()
        })
        .collect()
}

fn managers(count: usize) -> Vec<UserAccount> {
    (0..count)
        .map(|i| {
            UserAccount::new(UserId::new(), format!("manager-{i}"), "m@fogon.test", Role::Manager)
                .unwrap()
        })
        .collect()
}

/// Converged store: what a second pass sees.
fn converged(products: &[Product], managers: &[UserAccount]) -> Vec<Notification> {
    reconcile(products, managers, &[])
        .to_create
        .into_iter()
        .map(|n| n.into_stored(NotificationId::new(), Utc::now()))
        .collect()
}

fn bench_first_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_first_pass");
    let staff = managers(5);

    for size in [100usize, 1_000, 10_000] {
        let products = catalog(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &products, |b, products| {
            b.iter(|| reconcile(black_box(products), black_box(&staff), &[]));
        });
    }

    group.finish();
}

fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_steady_state");
    let staff = managers(5);

    for size in [100usize, 1_000, 10_000] {
        let products = catalog(size);
        let existing = converged(&products, &staff);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &products, |b, products| {
            b.iter(|| {
                let plan = reconcile(black_box(products), black_box(&staff), black_box(&existing));
                assert!(plan.is_noop());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_first_pass, bench_steady_state);
criterion_main!(benches);
