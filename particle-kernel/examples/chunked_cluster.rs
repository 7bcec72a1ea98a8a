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
//! Dense double-precision cluster resolved through the spatial-hash grid
//!
//! Packs particles tightly enough that the chunked resolver has real work
//! every sub-step, then reports throughput and the final overlap count.
//!
//! # Running
//!
//! ```bash
//! cargo run --example chunked_cluster --release
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

fn overlapping_pairs(world: &World<f64>) -> usize {
    let mut overlaps = 0;
    for i in 0..world.count() {
        for j in (i + 1)..world.count() {
            let dx = world.x()[i] - world.x()[j];
            let dy = world.y()[i] - world.y()[j];
            let minimal = world.radius()[i] + world.radius()[j];
            if dx * dx + dy * dy < minimal * minimal {
                overlaps += 1;
            }
        }
    }
    overlaps
}

fn main() {
    env_logger::init();

    let ticks: u32 = 50;
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let count = (512 + workers - 1) / workers * workers;

    let mut params = WorldParams::<f64>::new(count);
    params.workers = workers;
    params.collision_variant = CollisionVariant::SpatialHash;
    params.chunk_size = 16.0;
    let mut world = World::new(params).expect("world configuration");

    // A tight blob: plenty of initial penetration for the resolver.
    let mut rng = SimpleRng::new(7);
    for i in 0..count {
        let x = 400.0 + rng.next_f64() * 200.0;
        let y = 400.0 + rng.next_f64() * 200.0;
        world.particles_mut().seed(i, x, y, 1.0, 3.0);
    }

    let initial_overlaps = overlapping_pairs(&world);
    let start = Instant::now();
    for _ in 0..ticks {
        world.step();
    }
    let elapsed = start.elapsed();

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
        "overlapping pairs: {} before, {} after",
        initial_overlaps,
        overlapping_pairs(&world)
    );
}
