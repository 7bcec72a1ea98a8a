// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Integration tests for the kernel-level behavioral guarantees

use particle_kernel::collision::hash_grid::chunk_hash;
use particle_kernel::collision::resolve_pair_in_place;
use particle_kernel::constraint::BoundaryConstraint;
use particle_kernel::gravity::GravityKernel;
use particle_kernel::integrate::integrate;
use particle_kernel::{ParticleStore, WorkerPool};

fn pair_distance(store: &ParticleStore<f64>, i: usize, j: usize) -> f64 {
    let dx = store.x()[i] - store.x()[j];
    let dy = store.y()[i] - store.y()[j];
    (dx * dx + dy * dy).sqrt()
}

#[test]
fn integrate_is_identity_at_rest() {
    for count in [1, 7, 32, 100] {
        let pool = WorkerPool::with_workers(4).unwrap();
        let mut store = ParticleStore::<f64>::new(count).unwrap();
        for i in 0..count {
            store.seed(i, i as f64 * 3.5, 100.0 - i as f64, 1.0, 1.0);
        }

        integrate(&mut store, &pool, 0.01, None);

        for i in 0..count {
            assert_eq!(store.x()[i], i as f64 * 3.5, "x moved for count {}", count);
            assert_eq!(store.y()[i], 100.0 - i as f64);
        }
    }
}

#[test]
fn narrow_phase_ignores_separated_pairs() {
    let configs = [
        ((0.0, 0.0, 1.0), (5.0, 0.0, 1.0)),
        ((0.0, 0.0, 2.0), (0.0, 4.5, 2.0)),
        ((10.0, 10.0, 0.5), (11.5, 11.5, 0.5)),
    ];

    for ((x0, y0, r0), (x1, y1, r1)) in configs {
        let mut store = ParticleStore::<f64>::new(2).unwrap();
        store.seed(0, x0, y0, 1.0, r0);
        store.seed(1, x1, y1, 1.0, r1);

        resolve_pair_in_place(1.0, 0, 1, &mut store.contact_view());

        assert_eq!(store.x()[0], x0);
        assert_eq!(store.y()[0], y0);
        assert_eq!(store.x()[1], x1);
        assert_eq!(store.y()[1], y1);
    }
}

#[test]
fn narrow_phase_strictly_separates_penetrating_pairs() {
    for responsibility in [0.1, 0.25, 0.5, 0.75, 1.0] {
        let mut store = ParticleStore::<f64>::new(2).unwrap();
        store.seed(0, 0.0, 0.0, 1.0, 2.0);
        store.seed(1, 1.5, 1.0, 2.0, 2.0);

        let before = pair_distance(&store, 0, 1);
        resolve_pair_in_place(responsibility, 0, 1, &mut store.contact_view());
        let after = pair_distance(&store, 0, 1);

        assert!(
            after > before,
            "responsibility {} left distance at {}",
            responsibility,
            after
        );
        // The correction approaches contact distance without overshooting.
        assert!(after <= 4.0 + 1e-12);
    }
}

#[test]
fn bucket_ids_are_collision_free_on_the_test_grid() {
    let mut seen = std::collections::HashMap::new();
    for cx in 0..=31i64 {
        for cy in 0..=31i64 {
            if let Some((px, py)) = seen.insert(chunk_hash(cx, cy), (cx, cy)) {
                panic!(
                    "bucket id {} shared by ({}, {}) and ({}, {})",
                    chunk_hash(cx, cy),
                    px,
                    py,
                    cx,
                    cy
                );
            }
        }
    }
}

#[test]
fn constraint_output_is_always_inside_the_box() {
    let pool = WorkerPool::with_workers(2).unwrap();
    let constraint = BoundaryConstraint::new(512.0_f64, 25.0);

    let mut store = ParticleStore::<f64>::new(10).unwrap();
    let positions = [
        -1e9, -25.0, 0.0, 24.999, 25.0, 256.0, 486.999, 487.0, 512.0, 1e9,
    ];
    for (i, &p) in positions.iter().enumerate() {
        store.seed(i, p, p, 1.0, 1.0);
    }

    constraint.apply(&mut store, &pool);

    for i in 0..10 {
        assert!(store.x()[i] >= 25.0 && store.x()[i] <= 487.0);
        assert!(store.y()[i] >= 25.0 && store.y()[i] <= 487.0);
    }
}

#[test]
fn collinear_triple_cancels_on_the_middle_particle() {
    // Equal masses, touching radii, evenly spaced on a line.
    let pool = WorkerPool::with_workers(3).unwrap();
    let mut store = ParticleStore::<f64>::new(3).unwrap();
    store.seed(0, 100.0, 50.0, 4.0, 1.0);
    store.seed(1, 102.0, 50.0, 4.0, 1.0);
    store.seed(2, 104.0, 50.0, 4.0, 1.0);

    let kernel = GravityKernel::new(6.67445);
    kernel.accumulate(&mut store, &pool);

    assert_eq!(store.acceleration_x()[1], 0.0);
    assert_eq!(store.acceleration_y()[1], 0.0);
    assert!(store.acceleration_x()[0] > 0.0, "left particle must pull right");
    assert!(store.acceleration_x()[2] < 0.0, "right particle must pull left");
}

#[test]
fn resolution_splits_by_mass_ratio() {
    // Masses 1 and 3: the heavy particle receives a quarter of the total
    // correction, a third of what the light one receives.
    let mut store = ParticleStore::<f64>::new(2).unwrap();
    store.seed(0, 0.0, 0.0, 1.0, 2.0);
    store.seed(1, 2.0, 0.0, 3.0, 2.0);

    resolve_pair_in_place(1.0, 0, 1, &mut store.contact_view());

    let light_moved = store.x()[0].abs();
    let heavy_moved = (store.x()[1] - 2.0).abs();
    let total = light_moved + heavy_moved;

    assert!(total > 0.0);
    assert!((heavy_moved - total / 4.0).abs() < 1e-12);
    assert!((heavy_moved * 3.0 - light_moved).abs() < 1e-12);
}
