//! Benchmarks for slot integration, pooling, exit rays and zeroing.

use bevy::math::bounding::Aabb3d;
use bevy::prelude::*;
use bevy_ballistics_core::components::{ProjectileSlots, ProjectileSource};
use bevy_ballistics_core::pool::CyclicPool;
use bevy_ballistics_core::resources::BallisticsEnvironment;
use bevy_ballistics_core::systems::exit_ray::{find_exit, ExitRaySettings};
use bevy_ballistics_core::systems::kinematics::integrate_active_slots;
use bevy_ballistics_core::systems::zeroing::{solve_zeroing_batch, ZeroingParams, ZeroingSettings};
use bevy_ballistics_core::types::SolidBox;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn benchmark_rk4_integration(c: &mut Criterion) {
    let env = BallisticsEnvironment::default();

    let mut group = c.benchmark_group("RK4 Integration");

    for projectile_count in [100, 1000, 10000].iter() {
        let sources: Vec<ProjectileSource> = (0..*projectile_count)
            .map(|i| ProjectileSource::new(Vec3::ZERO, Vec3::new(400.0 + i as f32, 0.0, 0.0)))
            .collect();
        let mut slots = ProjectileSlots::new(*projectile_count);
        slots.insert(&sources, 0);

        group.bench_with_input(
            BenchmarkId::from_parameter(projectile_count),
            projectile_count,
            |b, &_count| {
                b.iter(|| integrate_active_slots(&mut slots, 1.0 / 60.0, &env));
            },
        );
    }

    group.finish();
}

fn benchmark_pool_cycle(c: &mut Criterion) {
    let mut pool = CyclicPool::new(|| Vec3::ZERO, 64, 64);

    c.bench_function("Pool Acquire/Release", |b| {
        b.iter(|| {
            let handle = pool.acquire();
            let _ = pool.release(handle);
        });
    });

    c.bench_function("Pool Reclaim Oldest", |b| {
        for _ in 0..64 {
            pool.acquire();
        }
        b.iter(|| pool.acquire());
    });
}

fn benchmark_exit_ray(c: &mut Criterion) {
    let shape = SolidBox::new(Vec3::ZERO, Vec3::splat(1.0));
    let bounds = Aabb3d::new(shape.center, shape.half_extents);
    let settings = ExitRaySettings::default();

    c.bench_function("Exit Ray Through Box", |b| {
        b.iter(|| find_exit(&bounds, &shape, Vec3::ZERO, Dir3::X, &settings));
    });
}

fn benchmark_zeroing(c: &mut Criterion) {
    let params = ZeroingParams::default();
    let settings = ZeroingSettings::default();
    let distances = [100.0, 200.0, 300.0, 500.0, 800.0];

    c.bench_function("Zeroing Batch (5 distances)", |b| {
        b.iter(|| solve_zeroing_batch(&distances, &params, &settings));
    });
}

criterion_group!(
    benches,
    benchmark_rk4_integration,
    benchmark_pool_cycle,
    benchmark_exit_ray,
    benchmark_zeroing
);
criterion_main!(benches);
