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
//! Spatial-hash chunked collision resolution
//!
//! Particles carry a per-particle chunk id derived from their grid cell by
//! the pairing function [`chunk_hash`], refreshed on every integration.
//! Resolution groups particles by chunk id, then for each chunk center
//! gathers the members of the 3×3 neighboring block and runs the exact
//! narrow-phase test over every unordered pair of the gathered set.
//!
//! # Striped dispatch
//!
//! Centers are dispatched in two passes: first every column with
//! `cx ≡ 1 (mod 3)`, then every column with `cx ≡ 2 (mod 3)`, all rows per
//! column. No two concurrently scheduled centers of a pass share a column
//! neighborhood, and every adjacent-cell pair is still seen by some center. Within a pass, center tasks fold their corrections into private
//! displacement buffers merged at the pass barrier, which also keeps rows
//! of the same stripe from racing on shared particles.

use std::collections::HashMap;

use crate::collision::{accumulate_pair, CollisionStrategy};
use crate::scalar::Scalar;
use crate::scheduler::{partition_ranges, WorkerPool};
use crate::store::ParticleStore;

/// n-th triangular number.
pub fn triangular(n: i64) -> i64 {
    n * (n + 1) / 2
}

/// Pair two signed chunk coordinates into a single bucket id.
///
/// Defined as `triangular(cx + cy) + cx`, which is injective over
/// non-negative coordinates. Neighbor membership tests compare these ids
/// directly, so the exact formula matters more than hash quality.
pub fn chunk_hash(cx: i64, cy: i64) -> i64 {
    triangular(cx + cy) + cx
}

/// Grid cell owning the position `(x, y)` for the given chunk size.
pub fn chunk_coords<S: Scalar>(x: S, y: S, chunk_size: S) -> (i64, i64) {
    (
        (x / chunk_size).floor().to_f64() as i64,
        (y / chunk_size).floor().to_f64() as i64,
    )
}

/// Spatial-hash collision pipeline (broad phase variant B).
///
/// # Examples
///
/// ```
/// use particle_kernel::collision::hash_grid::SpatialHashStrategy;
/// use particle_kernel::collision::CollisionStrategy;
/// use particle_kernel::{ParticleStore, WorkerPool};
/// use particle_kernel::integrate::integrate;
///
/// let pool = WorkerPool::with_workers(1).unwrap();
/// let mut store = ParticleStore::<f64>::new(2).unwrap();
/// store.seed(0, 20.0, 20.0, 1.0, 2.0);
/// store.seed(1, 21.0, 20.0, 1.0, 2.0);
///
/// let mut strategy = SpatialHashStrategy::new(1024.0, 16.0);
/// integrate(&mut store, &pool, 0.01, strategy.chunk_size());
/// strategy.resolve(&mut store, &pool, 0.5).unwrap();
/// assert!(store.x()[1] - store.x()[0] > 1.0);
/// ```
pub struct SpatialHashStrategy<S: Scalar> {
    chunk_size: S,
    max_column: i64,
    max_row: i64,
    groups: HashMap<i64, Vec<u32>>,
}

impl<S: Scalar> SpatialHashStrategy<S> {
    /// Create a strategy for a square world of side `world_size` bucketed
    /// into cells of side `chunk_size`.
    ///
    /// # Panics
    ///
    /// Panics if either argument is non-positive or not finite.
    pub fn new(world_size: S, chunk_size: S) -> Self {
        assert!(
            world_size > S::ZERO && world_size.is_finite(),
            "World size must be positive and finite"
        );
        assert!(
            chunk_size > S::ZERO && chunk_size.is_finite(),
            "Chunk size must be positive and finite"
        );

        let max_column = (world_size / chunk_size).floor().to_f64() as i64;
        SpatialHashStrategy {
            chunk_size,
            max_column,
            max_row: max_column,
            groups: HashMap::new(),
        }
    }

    /// Rebuild the chunk-id buckets from the store's current ids.
    ///
    /// Bucket vectors are retained between passes to avoid reallocation.
    fn rebuild_groups(&mut self, store: &ParticleStore<S>) {
        for bucket in self.groups.values_mut() {
            bucket.clear();
        }
        for (id, &hash) in store.chunk_index().iter().enumerate() {
            self.groups.entry(hash).or_default().push(id as u32);
        }
    }
}

impl<S: Scalar> CollisionStrategy<S> for SpatialHashStrategy<S> {
    fn name(&self) -> &str {
        "spatial-hash"
    }

    fn chunk_size(&self) -> Option<S> {
        Some(self.chunk_size)
    }

    fn resolve(
        &mut self,
        store: &mut ParticleStore<S>,
        pool: &WorkerPool,
        responsibility: S,
    ) -> Result<(), String> {
        let count = store.count();
        self.rebuild_groups(store);
        let groups = &self.groups;

        for stripe in [1i64, 2] {
            let centers: Vec<(i64, i64)> = (0..=self.max_column + 1)
                .filter(|cx| cx % 3 == stripe)
                .flat_map(|cx| (0..=self.max_row).map(move |cy| (cx, cy)))
                .collect();
            if centers.is_empty() {
                continue;
            }

            let tasks: Vec<Vec<(i64, i64)>> = partition_ranges(centers.len(), pool.workers())
                .into_iter()
                .map(|range| centers[range].to_vec())
                .collect();

            let partials = {
                let x = store.x();
                let y = store.y();
                let mass = store.mass();
                let radius = store.radius();

                pool.accumulate(count, tasks, |task_centers, partials| {
                    let mut gathered: Vec<u32> = Vec::new();
                    for (cx, cy) in task_centers {
                        gathered.clear();
                        for nx in (cx - 1)..=(cx + 1) {
                            for ny in (cy - 1)..=(cy + 1) {
                                if let Some(bucket) = groups.get(&chunk_hash(nx, ny)) {
                                    gathered.extend_from_slice(bucket);
                                }
                            }
                        }
                        if gathered.len() < 2 {
                            continue;
                        }

                        for a in 0..gathered.len() {
                            for b in (a + 1)..gathered.len() {
                                accumulate_pair(
                                    responsibility,
                                    gathered[a] as usize,
                                    gathered[b] as usize,
                                    x,
                                    y,
                                    mass,
                                    radius,
                                    partials,
                                );
                            }
                        }
                    }
                })
            };

            // Pass barrier: the second stripe sees the first stripe's
            // corrections.
            store.apply_displacements(&partials);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrate::integrate;

    #[test]
    fn test_triangular_numbers() {
        assert_eq!(triangular(0), 0);
        assert_eq!(triangular(1), 1);
        assert_eq!(triangular(2), 3);
        assert_eq!(triangular(3), 6);
        assert_eq!(triangular(4), 10);
    }

    #[test]
    fn test_chunk_hash_formula() {
        assert_eq!(chunk_hash(0, 0), 0);
        assert_eq!(chunk_hash(1, 0), 2);
        assert_eq!(chunk_hash(0, 1), 1);
        assert_eq!(chunk_hash(1, 2), 7);
        assert_eq!(chunk_hash(2, 0), 5);
    }

    #[test]
    fn test_chunk_hash_injective_on_grid() {
        let mut seen = std::collections::HashSet::new();
        for cx in 0..=15 {
            for cy in 0..=15 {
                assert!(
                    seen.insert(chunk_hash(cx, cy)),
                    "bucket id collision at ({}, {})",
                    cx,
                    cy
                );
            }
        }
    }

    #[test]
    fn test_chunk_coords_floor_toward_negative_infinity() {
        assert_eq!(chunk_coords(31.9_f64, 0.0, 16.0), (1, 0));
        assert_eq!(chunk_coords(32.0_f64, 32.0, 16.0), (2, 2));
        assert_eq!(chunk_coords(-0.5_f64, 3.0, 2.0), (-1, 1));
    }

    fn resolved_distance(positions: [(f64, f64); 2], passes: usize) -> f64 {
        let pool = WorkerPool::with_workers(1).unwrap();
        let mut store = ParticleStore::<f64>::new(2).unwrap();
        store.seed(0, positions[0].0, positions[0].1, 1.0, 2.0);
        store.seed(1, positions[1].0, positions[1].1, 1.0, 2.0);

        let mut strategy = SpatialHashStrategy::new(1024.0, 16.0);
        integrate(&mut store, &pool, 0.01, strategy.chunk_size());
        for _ in 0..passes {
            strategy.resolve(&mut store, &pool, 0.5).unwrap();
        }

        let dx = store.x()[0] - store.x()[1];
        let dy = store.y()[0] - store.y()[1];
        (dx * dx + dy * dy).sqrt()
    }

    #[test]
    fn test_overlap_within_one_chunk_is_corrected() {
        // Both particles in the same cell, overlapping.
        let distance = resolved_distance([(20.0, 20.0), (22.0, 20.0)], 20);
        assert!(distance > 3.9);
    }

    #[test]
    fn test_overlap_across_chunk_border_is_corrected() {
        // Straddles the border between columns 0 and 1 (x = 16).
        let distance = resolved_distance([(15.0, 8.0), (17.0, 8.0)], 20);
        assert!(distance > 3.9);
    }

    #[test]
    fn test_overlap_in_uncentered_column_is_corrected() {
        // Column 3 is never a center; its pairs come from centers 2 and 4.
        let distance = resolved_distance([(50.0, 8.0), (52.0, 8.0)], 20);
        assert!(distance > 3.9);
    }

    #[test]
    fn test_distant_pair_is_untouched() {
        let distance = resolved_distance([(20.0, 20.0), (500.0, 500.0)], 5);
        let expected = ((480.0_f64 * 480.0) + (480.0 * 480.0)).sqrt();
        assert!((distance - expected).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "Chunk size must be positive and finite")]
    fn test_zero_chunk_size_panics() {
        SpatialHashStrategy::<f64>::new(1024.0, 0.0);
    }
}
