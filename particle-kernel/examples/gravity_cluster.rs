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
//! Gravitating cluster with sort-sweep collision resolution
//!
//! Seeds a deterministic random cluster, runs a fixed number of ticks, and
//! reports wall-clock throughput plus the center-of-mass drift.
//!
//! # Running
//!
//! ```bash
//! cargo run --example gravity_cluster --release
//! RUST_LOG=debug cargo run --example gravity_cluster
//! ```

use std::time::Instant;

use particle_kernel::{CollisionVariant, World, WorldParams};

/// Deterministic LCG so runs are reproducible.
/// Multiplier and increment are the Knuth MMIX parameters.
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        SimpleRng { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / 9007199254740992.0
    }
}

fn center_of_mass(world: &World<f32>) -> (f32, f32) {
    let mut cx = 0.0;
    let mut cy = 0.0;
    let mut total = 0.0;
    for i in 0..world.count() {
        let m = world.mass()[i];
        cx += world.x()[i] * m;
        cy += world.y()[i] * m;
        total += m;
    }
    (cx / total, cy / total)
}

fn main() {
    env_logger::init();

    let ticks: u32 = 100;
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    // Round the ensemble up so it divides evenly across the pool.
    let count = (1024 + workers - 1) / workers * workers;

    let mut params = WorldParams::<f32>::new(count);
    params.workers = workers;
    params.collision_variant = CollisionVariant::SortSweep;
    let mut world = World::new(params).expect("world configuration");

    let mut rng = SimpleRng::new(42);
    for i in 0..count {
        let x = 212.0 + rng.next_f64() as f32 * 600.0;
        let y = 212.0 + rng.next_f64() as f32 * 600.0;
        let mass = 0.5 + rng.next_f64() as f32 * 2.0;
        world.particles_mut().seed(i, x, y, mass, 2.0);
    }

    let start_com = center_of_mass(&world);
    let start = Instant::now();
    for _ in 0..ticks {
        world.step();
    }
    let elapsed = start.elapsed();

    let end_com = center_of_mass(&world);
    println!(
        "{} ticks for {} particles ({} variant, {} workers): {:.3?} total, {:.3?} per tick",
        ticks,
        world.count(),
        world.collision_variant_name(),
        workers,
        elapsed,
        elapsed / ticks
    );
    println!(
        "center of mass drifted ({:.3}, {:.3}) -> ({:.3}, {:.3})",
        start_com.0, start_com.1, end_com.0, end_com.1
    );
}
