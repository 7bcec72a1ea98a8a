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
//! Struct-of-arrays particle storage
//!
//! The ensemble is stored as one flat numeric buffer per scalar field,
//! indexed by particle id. This keeps hot loops cache-friendly and lets the
//! scheduler hand disjoint index ranges of the same field to different
//! workers without locks. The store itself performs no bounds or race
//! checking; safety comes from the partition methods below, which split each
//! buffer into non-overlapping mutable views.
//!
//! The ensemble size is fixed at construction. Particles are never
//! individually destroyed; the whole store is torn down with the simulation.

use crate::scalar::Scalar;
use crate::scheduler::{partition_ranges, Partials, WorkerPool};

/// Struct-of-arrays container for all per-particle scalar fields.
///
/// All buffers have identical length `count`. Mass must be positive and
/// radius non-negative; neither is guarded at runtime (zero or negative mass
/// is undefined behavior in the kernels).
///
/// # Examples
///
/// ```
/// use particle_kernel::ParticleStore;
///
/// let mut store = ParticleStore::<f32>::new(16).unwrap();
/// store.seed(0, 10.0, 20.0, 1.0, 2.0);
/// assert_eq!(store.x()[0], 10.0);
/// assert_eq!(store.count(), 16);
/// ```
pub struct ParticleStore<S: Scalar> {
    count: usize,

    x: Vec<S>,
    y: Vec<S>,

    prev_x: Vec<S>,
    prev_y: Vec<S>,

    acceleration_x: Vec<S>,
    acceleration_y: Vec<S>,

    mass: Vec<S>,
    radius: Vec<S>,

    chunk_index_store: Vec<i64>,
}

/// Read positions and masses, write accumulated accelerations.
///
/// Borrow-split view used by the gravity kernel.
pub struct ForceView<'a, S: Scalar> {
    /// Current x positions.
    pub x: &'a [S],
    /// Current y positions.
    pub y: &'a [S],
    /// Particle masses.
    pub mass: &'a [S],
    /// Accumulated x acceleration.
    pub acceleration_x: &'a mut [S],
    /// Accumulated y acceleration.
    pub acceleration_y: &'a mut [S],
}

/// Read masses and radii, write positions.
///
/// Borrow-split view used by the in-place narrow-phase resolver.
pub struct ContactView<'a, S: Scalar> {
    /// Current x positions.
    pub x: &'a mut [S],
    /// Current y positions.
    pub y: &'a mut [S],
    /// Particle masses.
    pub mass: &'a [S],
    /// Collision radii.
    pub radius: &'a [S],
}

/// One worker's disjoint range of every field the integrator touches.
pub struct IntegrateSlice<'a, S: Scalar> {
    /// Current x positions.
    pub x: &'a mut [S],
    /// Current y positions.
    pub y: &'a mut [S],
    /// x positions one step ago.
    pub prev_x: &'a mut [S],
    /// y positions one step ago.
    pub prev_y: &'a mut [S],
    /// Accumulated x acceleration, reset by the integrator.
    pub acceleration_x: &'a mut [S],
    /// Accumulated y acceleration, reset by the integrator.
    pub acceleration_y: &'a mut [S],
    /// Spatial bucket id, recomputed when chunked collision is active.
    pub chunk_index: &'a mut [i64],
}

impl<S: Scalar> ParticleStore<S> {
    /// Allocate zeroed buffers for `count` particles.
    ///
    /// Fails if `count` is not positive.
    pub fn new(count: usize) -> Result<Self, String> {
        if count == 0 {
            return Err("particle count must be positive".to_string());
        }

        Ok(ParticleStore {
            count,
            x: vec![S::ZERO; count],
            y: vec![S::ZERO; count],
            prev_x: vec![S::ZERO; count],
            prev_y: vec![S::ZERO; count],
            acceleration_x: vec![S::ZERO; count],
            acceleration_y: vec![S::ZERO; count],
            mass: vec![S::ZERO; count],
            radius: vec![S::ZERO; count],
            chunk_index_store: vec![0; count],
        })
    }

    /// Allocate a store whose size is compatible with `pool`.
    ///
    /// In the parallel build this additionally fails if `count` is not
    /// evenly divisible by the pool's worker count, since stage dispatch
    /// hands every worker an equally sized index range.
    pub fn for_pool(count: usize, pool: &WorkerPool) -> Result<Self, String> {
        #[cfg(feature = "parallel")]
        if count % pool.workers() != 0 {
            return Err(format!(
                "particle count {} is not divisible by worker count {}",
                count,
                pool.workers()
            ));
        }
        #[cfg(not(feature = "parallel"))]
        let _ = pool;

        Self::new(count)
    }

    /// Number of particles in the ensemble.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Current x positions.
    pub fn x(&self) -> &[S] {
        &self.x
    }

    /// Current y positions.
    pub fn y(&self) -> &[S] {
        &self.y
    }

    /// x positions one integration step ago.
    pub fn prev_x(&self) -> &[S] {
        &self.prev_x
    }

    /// y positions one integration step ago.
    pub fn prev_y(&self) -> &[S] {
        &self.prev_y
    }

    /// Accumulated x accelerations.
    pub fn acceleration_x(&self) -> &[S] {
        &self.acceleration_x
    }

    /// Accumulated y accelerations.
    pub fn acceleration_y(&self) -> &[S] {
        &self.acceleration_y
    }

    /// Particle masses.
    pub fn mass(&self) -> &[S] {
        &self.mass
    }

    /// Collision radii.
    pub fn radius(&self) -> &[S] {
        &self.radius
    }

    /// Spatial bucket id per particle (chunked collision variant).
    pub fn chunk_index(&self) -> &[i64] {
        &self.chunk_index_store
    }

    /// Place particle `i` at `(x, y)` with zero implicit velocity.
    pub fn seed(&mut self, i: usize, x: S, y: S, mass: S, radius: S) {
        self.x[i] = x;
        self.y[i] = y;
        self.prev_x[i] = x;
        self.prev_y[i] = y;
        self.mass[i] = mass;
        self.radius[i] = radius;
    }

    /// Overwrite particle `i`'s current position.
    pub fn set_position(&mut self, i: usize, x: S, y: S) {
        self.x[i] = x;
        self.y[i] = y;
    }

    /// Overwrite particle `i`'s previous position.
    ///
    /// The gap between previous and current position is the implicit
    /// velocity consumed by the integrator.
    pub fn set_prev_position(&mut self, i: usize, x: S, y: S) {
        self.prev_x[i] = x;
        self.prev_y[i] = y;
    }

    /// Borrow-split view for force accumulation.
    pub fn force_view(&mut self) -> ForceView<'_, S> {
        ForceView {
            x: &self.x,
            y: &self.y,
            mass: &self.mass,
            acceleration_x: &mut self.acceleration_x,
            acceleration_y: &mut self.acceleration_y,
        }
    }

    /// Borrow-split view for in-place contact resolution.
    pub fn contact_view(&mut self) -> ContactView<'_, S> {
        ContactView {
            x: &mut self.x,
            y: &mut self.y,
            mass: &self.mass,
            radius: &self.radius,
        }
    }

    /// Partition every integrator field into `parts` disjoint range views.
    ///
    /// Views cover `0..count` contiguously and without overlap, so they can
    /// be dispatched to concurrent workers.
    pub fn integrate_slices(&mut self, parts: usize) -> Vec<IntegrateSlice<'_, S>> {
        let ranges = partition_ranges(self.count, parts);
        let mut out = Vec::with_capacity(ranges.len());

        let mut rest = (
            self.x.as_mut_slice(),
            self.y.as_mut_slice(),
            self.prev_x.as_mut_slice(),
            self.prev_y.as_mut_slice(),
            self.acceleration_x.as_mut_slice(),
            self.acceleration_y.as_mut_slice(),
            self.chunk_index_store.as_mut_slice(),
        );

        for range in &ranges {
            let len = range.len();
            let (x, xr) = rest.0.split_at_mut(len);
            let (y, yr) = rest.1.split_at_mut(len);
            let (prev_x, pxr) = rest.2.split_at_mut(len);
            let (prev_y, pyr) = rest.3.split_at_mut(len);
            let (acceleration_x, axr) = rest.4.split_at_mut(len);
            let (acceleration_y, ayr) = rest.5.split_at_mut(len);
            let (chunk_index, cir) = rest.6.split_at_mut(len);

            out.push(IntegrateSlice {
                x,
                y,
                prev_x,
                prev_y,
                acceleration_x,
                acceleration_y,
                chunk_index,
            });
            rest = (xr, yr, pxr, pyr, axr, ayr, cir);
        }

        out
    }

    /// Partition the position buffers into `parts` disjoint range views.
    pub fn position_slices(&mut self, parts: usize) -> Vec<(&mut [S], &mut [S])> {
        let ranges = partition_ranges(self.count, parts);
        let mut out = Vec::with_capacity(ranges.len());

        let mut rest = (self.x.as_mut_slice(), self.y.as_mut_slice());
        for range in &ranges {
            let len = range.len();
            let (x, xr) = rest.0.split_at_mut(len);
            let (y, yr) = rest.1.split_at_mut(len);
            out.push((x, y));
            rest = (xr, yr);
        }

        out
    }

    /// Merge reduced per-worker acceleration contributions into the store.
    pub fn apply_acceleration_partials(&mut self, partials: &Partials<S>) {
        debug_assert_eq!(partials.len(), self.count);
        for i in 0..self.count {
            self.acceleration_x[i] += partials.dx[i];
            self.acceleration_y[i] += partials.dy[i];
        }
    }

    /// Merge reduced per-worker position displacements into the store.
    pub fn apply_displacements(&mut self, partials: &Partials<S>) {
        debug_assert_eq!(partials.len(), self.count);
        for i in 0..self.count {
            self.x[i] += partials.dx[i];
            self.y[i] += partials.dy[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_count_is_rejected() {
        assert!(ParticleStore::<f32>::new(0).is_err());
    }

    #[test]
    fn test_buffers_share_length() {
        let store = ParticleStore::<f64>::new(24).unwrap();
        assert_eq!(store.x().len(), 24);
        assert_eq!(store.y().len(), 24);
        assert_eq!(store.prev_x().len(), 24);
        assert_eq!(store.prev_y().len(), 24);
        assert_eq!(store.mass().len(), 24);
        assert_eq!(store.radius().len(), 24);
        assert_eq!(store.chunk_index().len(), 24);
    }

    #[test]
    fn test_seed_places_with_zero_velocity() {
        let mut store = ParticleStore::<f32>::new(4).unwrap();
        store.seed(2, 5.0, -3.0, 2.0, 0.5);
        assert_eq!(store.x()[2], 5.0);
        assert_eq!(store.prev_x()[2], 5.0);
        assert_eq!(store.y()[2], -3.0);
        assert_eq!(store.prev_y()[2], -3.0);
        assert_eq!(store.mass()[2], 2.0);
        assert_eq!(store.radius()[2], 0.5);
    }

    #[test]
    fn test_integrate_slices_cover_without_overlap() {
        let mut store = ParticleStore::<f32>::new(10).unwrap();
        let slices = store.integrate_slices(3);
        assert_eq!(slices.len(), 3);
        let total: usize = slices.iter().map(|s| s.x.len()).sum();
        assert_eq!(total, 10);
        for slice in &slices {
            assert_eq!(slice.x.len(), slice.prev_y.len());
            assert_eq!(slice.x.len(), slice.chunk_index.len());
        }
    }

    #[test]
    fn test_apply_displacements() {
        let mut store = ParticleStore::<f64>::new(2).unwrap();
        store.seed(0, 1.0, 1.0, 1.0, 1.0);
        store.seed(1, 2.0, 2.0, 1.0, 1.0);

        let mut partials = Partials::zeroed(2);
        partials.add(0, 0.5, -0.5);
        partials.add(1, -1.0, 1.0);
        store.apply_displacements(&partials);

        assert_eq!(store.x()[0], 1.5);
        assert_eq!(store.y()[0], 0.5);
        assert_eq!(store.x()[1], 1.0);
        assert_eq!(store.y()[1], 3.0);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_for_pool_requires_divisible_count() {
        let pool = WorkerPool::with_workers(4).unwrap();
        assert!(ParticleStore::<f32>::for_pool(64, &pool).is_ok());
        assert!(ParticleStore::<f32>::for_pool(63, &pool).is_err());
    }
}
