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
//! Sort-sweep broad phase with bounded-pair narrow resolution
//!
//! Every pass re-sorts a permutation of particle ids by ascending x and
//! fills per-slot bounding intervals (`position ± radius`, indexed by sort
//! slot, not particle id). Each worker then sweeps a disjoint slot range:
//! for slot `b` it scans forward slots until `x_b_ends[b] < x_b_starts[i]`,
//! at which point the ascending sort guarantees no later slot can overlap in
//! x and the inner scan breaks. Surviving slots are y-tested with two
//! symmetric half-open interval conditions, and matches are emitted as
//! **original particle ids** into the worker's private pair buffer.
//!
//! Pair buffers have fixed capacity. A full buffer silently drops further
//! candidates and undercounts collisions for the pass; this is accepted,
//! logged at warn level, and sized away by `pair_capacity`.
//!
//! The narrow phase folds each worker's candidate list into private
//! displacement buffers (candidate pairs from different workers may share a
//! particle), merges them at the stage barrier, and commits once.

use std::cmp::Ordering;
use std::ops::Range;

use crate::collision::{accumulate_pair, CollisionStrategy};
use crate::scalar::Scalar;
use crate::scheduler::{Partials, WorkerPool};
use crate::store::ParticleStore;

/// Minimum automatic pair-buffer capacity, in u32 slots.
const MIN_PAIR_SLOTS: usize = 256;

/// Scan a range of sort slots for candidate pairs.
///
/// Writes `(i, j)` original particle ids contiguously from offset 0 of
/// `pairs_out`, advancing the cursor by 2 per pair. Returns the final
/// cursor and the number of x-overlap checks performed.
///
/// The early break is only sound while slot order ascends by x and the
/// bound starts ascend with it, which holds for uniform radii; mixed radii
/// keep the sweep conservative but are not re-sorted by start.
pub fn find_pairs<S: Scalar>(
    range: Range<usize>,
    x_b_starts: &[S],
    x_b_ends: &[S],
    y_b_starts: &[S],
    y_b_ends: &[S],
    indexes_sorted_by_x: &[u32],
    pairs_out: &mut [u32],
) -> (usize, usize) {
    let count = indexes_sorted_by_x.len();
    let mut cursor = 0;
    let mut checks = 0;

    for b in range {
        for i in (b + 1)..count {
            if x_b_ends[b] < x_b_starts[i] {
                // No later slot can start before this one ends.
                break;
            }

            checks += 1;
            let y_bounds_down = y_b_ends[b] < y_b_starts[i] && y_b_starts[b] < y_b_ends[i];
            let y_bounds_up = y_b_starts[b] < y_b_ends[i] && y_b_ends[b] > y_b_starts[i];

            if (y_bounds_down || y_bounds_up) && cursor + 2 <= pairs_out.len() {
                pairs_out[cursor] = indexes_sorted_by_x[b];
                pairs_out[cursor + 1] = indexes_sorted_by_x[i];
                cursor += 2;
            }
        }
    }

    (cursor, checks)
}

/// Fold a range of candidate pairs from a flat buffer into displacement
/// partials.
///
/// `pair_count` is the true number of candidates in `pairs`; indices past it
/// are stale buffer content and the loop stops there regardless of `range`.
pub fn resolve_pairs<S: Scalar>(
    responsibility: S,
    pair_count: usize,
    range: Range<usize>,
    pairs: &[u32],
    x: &[S],
    y: &[S],
    mass: &[S],
    radius: &[S],
    partials: &mut Partials<S>,
) {
    for pair_index in range {
        if pair_index >= pair_count {
            break;
        }
        let i = pairs[pair_index * 2] as usize;
        let j = pairs[pair_index * 2 + 1] as usize;
        accumulate_pair(responsibility, i, j, x, y, mass, radius, partials);
    }
}

/// Sort-sweep collision pipeline (broad phase variant A).
///
/// # Examples
///
/// ```
/// use particle_kernel::collision::sweep::SortSweepStrategy;
/// use particle_kernel::collision::CollisionStrategy;
/// use particle_kernel::{ParticleStore, WorkerPool};
///
/// let pool = WorkerPool::with_workers(1).unwrap();
/// let mut store = ParticleStore::<f64>::new(2).unwrap();
/// store.seed(0, 10.0, 10.0, 1.0, 2.0);
/// store.seed(1, 11.0, 10.0, 1.0, 2.0);
///
/// let mut strategy = SortSweepStrategy::new(2, 1, 0);
/// strategy.resolve(&mut store, &pool, 0.5).unwrap();
/// assert!(store.x()[1] - store.x()[0] > 1.0);
/// ```
pub struct SortSweepStrategy<S: Scalar> {
    indexes_sorted_by_x: Vec<u32>,
    x_b_starts: Vec<S>,
    x_b_ends: Vec<S>,
    y_b_starts: Vec<S>,
    y_b_ends: Vec<S>,
    pair_buffers: Vec<Vec<u32>>,
}

impl<S: Scalar> SortSweepStrategy<S> {
    /// Create a strategy for `count` particles and `workers` pair buffers.
    ///
    /// `pair_capacity` is the per-worker buffer size in u32 slots (two per
    /// pair); pass 0 for an automatic size proportional to the per-worker
    /// particle share. Candidates beyond the capacity are silently dropped.
    pub fn new(count: usize, workers: usize, pair_capacity: usize) -> Self {
        assert!(workers > 0, "worker count must be positive");
        assert!(count <= u32::MAX as usize, "particle ids must fit in u32");

        let mut capacity = if pair_capacity == 0 {
            (count * 64 / workers).max(MIN_PAIR_SLOTS)
        } else {
            pair_capacity
        };
        // Two slots per pair.
        capacity &= !1;

        SortSweepStrategy {
            indexes_sorted_by_x: (0..count as u32).collect(),
            x_b_starts: vec![S::ZERO; count],
            x_b_ends: vec![S::ZERO; count],
            y_b_starts: vec![S::ZERO; count],
            y_b_ends: vec![S::ZERO; count],
            pair_buffers: vec![vec![0; capacity]; workers],
        }
    }

    /// Per-worker pair buffer capacity in u32 slots.
    pub fn pair_capacity(&self) -> usize {
        self.pair_buffers.first().map_or(0, Vec::len)
    }

    /// Re-sort the id permutation by ascending x and refresh the per-slot
    /// bounding intervals.
    fn prepare(&mut self, store: &ParticleStore<S>) {
        let x = store.x();
        let y = store.y();
        let radius = store.radius();

        self.indexes_sorted_by_x.sort_unstable_by(|&a, &b| {
            x[a as usize]
                .partial_cmp(&x[b as usize])
                .unwrap_or(Ordering::Equal)
        });

        for (slot, &id) in self.indexes_sorted_by_x.iter().enumerate() {
            let id = id as usize;
            self.x_b_starts[slot] = x[id] - radius[id];
            self.x_b_ends[slot] = x[id] + radius[id];
            self.y_b_starts[slot] = y[id] - radius[id];
            self.y_b_ends[slot] = y[id] + radius[id];
        }
    }
}

impl<S: Scalar> CollisionStrategy<S> for SortSweepStrategy<S> {
    fn name(&self) -> &str {
        "sort-sweep"
    }

    fn resolve(
        &mut self,
        store: &mut ParticleStore<S>,
        pool: &WorkerPool,
        responsibility: S,
    ) -> Result<(), String> {
        let count = store.count();
        if count != self.indexes_sorted_by_x.len() {
            return Err(format!(
                "sort-sweep state sized for {} particles, store holds {}",
                self.indexes_sorted_by_x.len(),
                count
            ));
        }
        if self.pair_buffers.len() != pool.workers() {
            return Err(format!(
                "sort-sweep state sized for {} workers, pool has {}",
                self.pair_buffers.len(),
                pool.workers()
            ));
        }

        self.prepare(store);

        let SortSweepStrategy {
            indexes_sorted_by_x,
            x_b_starts,
            x_b_ends,
            y_b_starts,
            y_b_ends,
            pair_buffers,
        } = self;
        let indexes_sorted_by_x: &[u32] = indexes_sorted_by_x;
        let x_b_starts: &[S] = x_b_starts;
        let x_b_ends: &[S] = x_b_ends;
        let y_b_starts: &[S] = y_b_starts;
        let y_b_ends: &[S] = y_b_ends;

        // Broad phase: disjoint slot ranges, one private buffer per worker.
        let mut results = vec![(0usize, 0usize); pair_buffers.len()];
        let tasks: Vec<(Range<usize>, &mut Vec<u32>, &mut (usize, usize))> = pool
            .partition(count)
            .into_iter()
            .zip(pair_buffers.iter_mut())
            .zip(results.iter_mut())
            .map(|((range, buffer), result)| (range, buffer, result))
            .collect();

        pool.run_tasks(tasks, |(range, buffer, result)| {
            *result = find_pairs(
                range,
                x_b_starts,
                x_b_ends,
                y_b_starts,
                y_b_ends,
                indexes_sorted_by_x,
                buffer,
            );
        });

        let candidate_pairs: usize = results.iter().map(|(cursor, _)| cursor / 2).sum();
        let overlap_checks: usize = results.iter().map(|(_, checks)| checks).sum();
        log::debug!(
            "sort-sweep broad phase: {} candidate pairs from {} x-overlap checks",
            candidate_pairs,
            overlap_checks
        );
        for ((cursor, _), buffer) in results.iter().zip(pair_buffers.iter()) {
            if *cursor == buffer.len() {
                log::warn!(
                    "pair buffer full at {} slots; excess candidates dropped this pass",
                    buffer.len()
                );
            }
        }

        // Narrow phase: candidates from different workers may share a
        // particle, so displacements go through the reduction commit.
        let x = store.x();
        let y = store.y();
        let mass = store.mass();
        let radius = store.radius();

        let narrow_tasks: Vec<(&[u32], usize)> = pair_buffers
            .iter()
            .zip(results.iter())
            .map(|(buffer, (cursor, _))| (buffer.as_slice(), cursor / 2))
            .collect();

        let partials = pool.accumulate(count, narrow_tasks, |(pairs, pair_count), partials| {
            resolve_pairs(
                responsibility,
                pair_count,
                0..pair_count,
                pairs,
                x,
                y,
                mass,
                radius,
                partials,
            );
        });

        store.apply_displacements(&partials);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bounds {
        x_starts: Vec<f64>,
        x_ends: Vec<f64>,
        y_starts: Vec<f64>,
        y_ends: Vec<f64>,
        sorted: Vec<u32>,
    }

    /// Build slot bounds for already-sorted particles with uniform radius.
    fn bounds_for(points: &[(f64, f64)], radius: f64) -> Bounds {
        let mut order: Vec<u32> = (0..points.len() as u32).collect();
        order.sort_unstable_by(|&a, &b| {
            points[a as usize]
                .0
                .partial_cmp(&points[b as usize].0)
                .unwrap()
        });
        let slot = |id: &u32| points[*id as usize];
        Bounds {
            x_starts: order.iter().map(|id| slot(id).0 - radius).collect(),
            x_ends: order.iter().map(|id| slot(id).0 + radius).collect(),
            y_starts: order.iter().map(|id| slot(id).1 - radius).collect(),
            y_ends: order.iter().map(|id| slot(id).1 + radius).collect(),
            sorted: order,
        }
    }

    #[test]
    fn test_overlapping_neighbors_are_emitted() {
        let bounds = bounds_for(&[(0.0, 0.0), (3.0, 0.0), (100.0, 0.0)], 2.0);
        let mut pairs = vec![0u32; 16];
        let (cursor, checks) = find_pairs(
            0..3,
            &bounds.x_starts,
            &bounds.x_ends,
            &bounds.y_starts,
            &bounds.y_ends,
            &bounds.sorted,
            &mut pairs,
        );

        assert_eq!(cursor, 2);
        assert_eq!(&pairs[..2], &[0, 1]);
        // The early break prunes the far slot before any y test runs.
        assert_eq!(checks, 1);
    }

    #[test]
    fn test_emits_original_particle_ids() {
        // Id order differs from x order.
        let bounds = bounds_for(&[(50.0, 0.0), (0.0, 0.0), (52.0, 0.0)], 2.0);
        let mut pairs = vec![0u32; 16];
        let (cursor, _) = find_pairs(
            0..3,
            &bounds.x_starts,
            &bounds.x_ends,
            &bounds.y_starts,
            &bounds.y_ends,
            &bounds.sorted,
            &mut pairs,
        );

        assert_eq!(cursor, 2);
        assert_eq!(&pairs[..2], &[0, 2]);
    }

    #[test]
    fn test_lower_slot_above_disjoint_neighbor_is_rejected() {
        // x intervals overlap but the x-earlier particle sits far above.
        let bounds = bounds_for(&[(0.0, 100.0), (1.0, 0.0)], 2.0);
        let mut pairs = vec![0u32; 8];
        let (cursor, checks) = find_pairs(
            0..2,
            &bounds.x_starts,
            &bounds.x_ends,
            &bounds.y_starts,
            &bounds.y_ends,
            &bounds.sorted,
            &mut pairs,
        );

        assert_eq!(checks, 1);
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_lower_slot_below_disjoint_neighbor_is_still_emitted() {
        // The half-open conditions keep candidates whose x-earlier particle
        // sits below; the narrow phase discards them on the exact test.
        let bounds = bounds_for(&[(0.0, 0.0), (1.0, 100.0)], 2.0);
        let mut pairs = vec![0u32; 8];
        let (cursor, _) = find_pairs(
            0..2,
            &bounds.x_starts,
            &bounds.x_ends,
            &bounds.y_starts,
            &bounds.y_ends,
            &bounds.sorted,
            &mut pairs,
        );

        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_full_buffer_drops_candidates_silently() {
        // Three mutually overlapping particles produce three pairs; one
        // pair fits.
        let bounds = bounds_for(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)], 2.0);
        let mut pairs = vec![0u32; 2];
        let (cursor, checks) = find_pairs(
            0..3,
            &bounds.x_starts,
            &bounds.x_ends,
            &bounds.y_starts,
            &bounds.y_ends,
            &bounds.sorted,
            &mut pairs,
        );

        assert_eq!(cursor, 2);
        assert_eq!(checks, 3);
    }

    #[test]
    fn test_resolve_pairs_honors_true_candidate_count() {
        let x = vec![0.0_f64, 1.0, 50.0, 51.0];
        let y = vec![0.0; 4];
        let mass = vec![1.0; 4];
        let radius = vec![2.0; 4];

        // Buffer holds stale content past the two real candidates.
        let pairs = vec![0u32, 1, 2, 3, 9, 9, 9, 9];
        let mut partials = Partials::zeroed(4);
        resolve_pairs(1.0, 2, 0..4, &pairs, &x, &y, &mass, &radius, &mut partials);

        assert!(partials.dx[0] < 0.0);
        assert!(partials.dx[1] > 0.0);
        assert!(partials.dx[2] < 0.0);
        assert!(partials.dx[3] > 0.0);
    }

    #[test]
    fn test_strategy_separates_overlapping_cluster() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let mut store = ParticleStore::<f64>::new(4).unwrap();
        store.seed(0, 100.0, 100.0, 1.0, 3.0);
        store.seed(1, 102.0, 100.0, 1.0, 3.0);
        store.seed(2, 100.0, 102.0, 1.0, 3.0);
        store.seed(3, 400.0, 400.0, 1.0, 3.0);

        let mut strategy = SortSweepStrategy::new(4, 2, 0);
        for _ in 0..40 {
            strategy.resolve(&mut store, &pool, 0.5).unwrap();
        }

        for i in 0..3 {
            for j in (i + 1)..3 {
                let dx = store.x()[i] - store.x()[j];
                let dy = store.y()[i] - store.y()[j];
                let distance = (dx * dx + dy * dy).sqrt();
                assert!(
                    distance > 5.9,
                    "pair ({}, {}) still penetrating at distance {}",
                    i,
                    j,
                    distance
                );
            }
        }
        // The isolated particle never moves.
        assert_eq!(store.x()[3], 400.0);
        assert_eq!(store.y()[3], 400.0);
    }

    #[test]
    fn test_automatic_capacity_is_even_and_bounded_below() {
        let strategy = SortSweepStrategy::<f32>::new(10, 4, 0);
        assert!(strategy.pair_capacity() >= MIN_PAIR_SLOTS);
        assert_eq!(strategy.pair_capacity() % 2, 0);

        let explicit = SortSweepStrategy::<f32>::new(10, 4, 33);
        assert_eq!(explicit.pair_capacity(), 32);
    }
}
