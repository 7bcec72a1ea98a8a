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
//! Verlet-style position integrator
//!
//! The ensemble carries no explicit velocity field. Velocity is implicit in
//! the gap between the current and previous position, and one update step is
//!
//! ```text
//! velocity = current − previous
//! previous = current
//! current  = current + velocity + acceleration · Δt
//! ```
//!
//! with the acceleration accumulator reset to zero afterwards for the next
//! gravity pass. When the spatial-hash collision variant is active the
//! integrator also refreshes each particle's chunk id from its new position,
//! so the bucket index is never stale by more than one sub-step.
//!
//! The update is embarrassingly parallel: each worker receives a disjoint
//! range view of every field and no reduction is needed.

use crate::collision::hash_grid::{chunk_coords, chunk_hash};
use crate::scalar::Scalar;
use crate::scheduler::WorkerPool;
use crate::store::{IntegrateSlice, ParticleStore};

/// Advance one range of particles by `time_delta`.
///
/// `chunk_size` enables the per-particle chunk id refresh used by the
/// spatial-hash collision variant.
pub fn integrate_slice<S: Scalar>(slice: IntegrateSlice<'_, S>, time_delta: S, chunk_size: Option<S>) {
    let len = slice.x.len();
    for i in 0..len {
        let velocity_x = slice.x[i] - slice.prev_x[i];
        let velocity_y = slice.y[i] - slice.prev_y[i];

        slice.prev_x[i] = slice.x[i];
        slice.prev_y[i] = slice.y[i];

        slice.x[i] = slice.x[i] + velocity_x + slice.acceleration_x[i] * time_delta;
        slice.y[i] = slice.y[i] + velocity_y + slice.acceleration_y[i] * time_delta;

        slice.acceleration_x[i] = S::ZERO;
        slice.acceleration_y[i] = S::ZERO;

        if let Some(chunk_size) = chunk_size {
            let (cx, cy) = chunk_coords(slice.x[i], slice.y[i], chunk_size);
            slice.chunk_index[i] = chunk_hash(cx, cy);
        }
    }
}

/// Advance the whole ensemble by `time_delta` across the pool.
pub fn integrate<S: Scalar>(
    store: &mut ParticleStore<S>,
    pool: &WorkerPool,
    time_delta: S,
    chunk_size: Option<S>,
) {
    let slices = store.integrate_slices(pool.workers());
    pool.run_tasks(slices, |slice| integrate_slice(slice, time_delta, chunk_size));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_rest_with_no_forces_is_a_no_op() {
        let pool = WorkerPool::with_workers(2).unwrap();
        let mut store = ParticleStore::<f64>::new(4).unwrap();
        for i in 0..4 {
            store.seed(i, i as f64 * 10.0, 7.0, 1.0, 1.0);
        }

        integrate(&mut store, &pool, 0.01, None);

        for i in 0..4 {
            assert_eq!(store.x()[i], i as f64 * 10.0);
            assert_eq!(store.y()[i], 7.0);
        }
    }

    #[test]
    fn test_implicit_velocity_carries_forward() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let mut store = ParticleStore::<f64>::new(1).unwrap();
        store.seed(0, 1.0, 0.0, 1.0, 1.0);
        store.set_prev_position(0, 0.0, 0.0);

        integrate(&mut store, &pool, 0.01, None);

        // velocity was (1, 0), so the particle keeps drifting.
        assert_eq!(store.x()[0], 2.0);
        assert_eq!(store.prev_x()[0], 1.0);

        integrate(&mut store, &pool, 0.01, None);
        assert_eq!(store.x()[0], 3.0);
    }

    #[test]
    fn test_acceleration_is_consumed_and_reset() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let mut store = ParticleStore::<f64>::new(1).unwrap();
        store.seed(0, 0.0, 0.0, 1.0, 1.0);

        {
            let view = store.force_view();
            view.acceleration_x[0] = 100.0;
            view.acceleration_y[0] = -50.0;
        }

        integrate(&mut store, &pool, 0.1, None);

        assert_eq!(store.x()[0], 10.0);
        assert_eq!(store.y()[0], -5.0);
        assert_eq!(store.acceleration_x()[0], 0.0);
        assert_eq!(store.acceleration_y()[0], 0.0);
    }

    #[test]
    fn test_chunk_ids_refresh_when_requested() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let mut store = ParticleStore::<f32>::new(2).unwrap();
        store.seed(0, 5.0, 5.0, 1.0, 1.0);
        store.seed(1, 37.0, 21.0, 1.0, 1.0);

        integrate(&mut store, &pool, 0.01, Some(16.0));

        assert_eq!(store.chunk_index()[0], chunk_hash(0, 0));
        assert_eq!(store.chunk_index()[1], chunk_hash(2, 1));
    }

    #[test]
    fn test_chunk_ids_untouched_without_chunking() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let mut store = ParticleStore::<f32>::new(1).unwrap();
        store.seed(0, 100.0, 100.0, 1.0, 1.0);

        integrate(&mut store, &pool, 0.01, None);
        assert_eq!(store.chunk_index()[0], 0);
    }
}
