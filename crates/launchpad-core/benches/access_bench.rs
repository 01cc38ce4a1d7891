//! # Access Benchmarks
//!
//! Cost of the per-navigation authorization checks.
//!
//! Run with: `cargo bench -p launchpad-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use launchpad_core::{
    Role, RouteGuard, SaveCoordinator, SiteStatus, Timestamp, can_access_page,
    next_valid_statuses, tab_access,
};
use std::hint::black_box;

const PATHS: &[&str] = &[
    "/dashboard",
    "/sites/42/study",
    "/approvals-procurement?tab=pending",
    "/platform-configuration/admin",
    "/insights",
    "//deployment/7/",
];

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_can_access_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("can_access_page");
    for role in Role::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(role), &role, |b, role| {
            b.iter(|| {
                for path in PATHS {
                    black_box(can_access_page(*role, black_box(path)));
                }
            });
        });
    }
    group.finish();
}

fn bench_tab_access(c: &mut Criterion) {
    c.bench_function("tab_access_denied_lookup", |b| {
        b.iter(|| black_box(tab_access(Some(Role::OpsManager), black_box("/users/9"))));
    });
}

fn bench_guard(c: &mut Criterion) {
    c.bench_function("route_guard_resolve", |b| {
        b.iter(|| {
            let mut guard = RouteGuard::new(black_box("/insights"));
            black_box(guard.resolve(Some(Role::Admin), false));
        });
    });
}

fn bench_transitions(c: &mut Criterion) {
    c.bench_function("next_valid_statuses_all", |b| {
        b.iter(|| {
            for status in SiteStatus::ALL {
                for role in Role::ALL {
                    black_box(next_valid_statuses(status, role));
                }
            }
        });
    });
}

fn bench_autosave(c: &mut Criterion) {
    let mut group = c.benchmark_group("autosave_due_sections");
    for size in [10usize, 100, 1000] {
        let mut coordinator: SaveCoordinator<u64> = SaveCoordinator::default();
        for i in 0..size {
            coordinator.update_section(&format!("section-{}", i), i as u64, Timestamp(i as u64));
        }
        group.bench_with_input(BenchmarkId::from_parameter(size), &coordinator, |b, c| {
            b.iter(|| black_box(c.due_sections(Timestamp(black_box(600)))));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_can_access_page,
    bench_tab_access,
    bench_guard,
    bench_transitions,
    bench_autosave
);
criterion_main!(benches);
