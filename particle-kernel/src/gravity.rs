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
//! Pairwise gravitational acceleration kernel
//!
//! Newton's law of universal gravitation over every unordered particle
//! pair:
//!
//! **F = G * (m₁ * m₂) / d²**
//!
//! The kernel works on squared distance and divides the difference vector by
//! the (single-precision: floored) distance, so no unit vector is formed
//! explicitly and only one square root is taken per pair.
//!
//! # Accumulation rule
//!
//! Each pair contribution is folded into the stored acceleration as
//!
//! ```text
//! candidate = stored + contribution
//! stored    = (stored + candidate) / 2
//! ```
//!
//! which averages the candidate with the stored value instead of summing.
//! Algebraically every contribution therefore lands at half weight
//! (`stored += contribution / 2`). This is a non-standard accumulation that
//! the kernel preserves deliberately; see DESIGN.md for the open question
//! around it. The half-weight identity is also what makes the rule
//! order-independent up to rounding, which the parallel path relies on.
//!
//! # Parallel dispatch
//!
//! Starting indices are assigned to workers in strides (worker `k` owns
//! `k, k + W, k + 2W, …`), which balances the triangular inner loop. A
//! worker's inner loop targets arbitrary `j`, so workers accumulate into
//! private [`Partials`](crate::scheduler::Partials) buffers that are merged
//! in a reduction barrier and committed once; concurrent tasks never write
//! the same shared index.
//!
//! # Numerical behavior
//!
//! Near-zero separations are not guarded beyond the single-precision
//! distance floor: a coincident pair produces ∞/NaN that propagates into
//! position state, which is accepted behavior rather than an error.

use crate::scalar::Scalar;
use crate::scheduler::WorkerPool;
use crate::store::{ForceView, ParticleStore};

/// Default gravitational constant for simulation-scale units.
pub const DEFAULT_G_CONSTANT: f64 = 6.67445;

/// Pairwise gravity accumulator.
///
/// # Examples
///
/// ```
/// use particle_kernel::gravity::GravityKernel;
/// use particle_kernel::{ParticleStore, WorkerPool};
///
/// let pool = WorkerPool::with_workers(1).unwrap();
/// let mut store = ParticleStore::<f64>::new(2).unwrap();
/// store.seed(0, 0.0, 0.0, 1.0, 1.0);
/// store.seed(1, 10.0, 0.0, 1.0, 1.0);
///
/// let kernel = GravityKernel::new(6.67445);
/// kernel.accumulate(&mut store, &pool);
/// assert!(store.acceleration_x()[0] > 0.0);
/// assert!(store.acceleration_x()[1] < 0.0);
/// ```
pub struct GravityKernel<S: Scalar> {
    g_constant: S,
}

impl<S: Scalar> GravityKernel<S> {
    /// Create a kernel with the given gravitational constant.
    ///
    /// # Panics
    ///
    /// Panics if `g_constant` is negative or not finite.
    pub fn new(g_constant: S) -> Self {
        assert!(
            g_constant >= S::ZERO && g_constant.is_finite(),
            "Gravitational constant must be non-negative and finite"
        );
        GravityKernel { g_constant }
    }

    /// The gravitational constant in use.
    pub fn g_constant(&self) -> S {
        self.g_constant
    }

    /// Accumulate the forces of one starting index against all later ones.
    ///
    /// For every `j > i0` the pair force is folded into both `i0`'s and
    /// `j`'s stored acceleration with the averaging rule. This is the
    /// single-task form of the kernel; dispatching it concurrently over a
    /// shared view is unsound because `j` targets overlap between tasks.
    /// Use [`GravityKernel::accumulate`] for the pool path.
    pub fn accumulate_from(&self, i0: usize, view: &mut ForceView<'_, S>) {
        let count = view.x.len();
        for j in (i0 + 1)..count {
            let dx = view.x[j] - view.x[i0];
            let dy = view.y[j] - view.y[i0];
            let distance_squared = dx * dx + dy * dy;

            let force = self.g_constant * view.mass[i0] * view.mass[j] / distance_squared;
            let acceleration = force / S::floored_distance(distance_squared.sqrt());

            let candidate_x = view.acceleration_x[i0] + dx * acceleration;
            let candidate_y = view.acceleration_y[i0] + dy * acceleration;
            view.acceleration_x[i0] = (view.acceleration_x[i0] + candidate_x) / S::TWO;
            view.acceleration_y[i0] = (view.acceleration_y[i0] + candidate_y) / S::TWO;

            let candidate_x = view.acceleration_x[j] - dx * acceleration;
            let candidate_y = view.acceleration_y[j] - dy * acceleration;
            view.acceleration_x[j] = (view.acceleration_x[j] + candidate_x) / S::TWO;
            view.acceleration_y[j] = (view.acceleration_y[j] + candidate_y) / S::TWO;
        }
    }

    /// Accumulate all pairwise accelerations into the store.
    ///
    /// Fork-join over the pool: workers fold half-weight contributions into
    /// private buffers, the buffers are merged at the stage barrier, and the
    /// sums are committed to the store in one pass.
    pub fn accumulate(&self, store: &mut ParticleStore<S>, pool: &WorkerPool) {
        let count = store.count();
        let workers = pool.workers();
        let g_constant = self.g_constant;

        let x = store.x();
        let y = store.y();
        let mass = store.mass();

        let offsets: Vec<usize> = (0..workers).collect();
        let partials = pool.accumulate(count, offsets, |offset, partials| {
            let mut i0 = offset;
            while i0 < count {
                for j in (i0 + 1)..count {
                    let dx = x[j] - x[i0];
                    let dy = y[j] - y[i0];
                    let distance_squared = dx * dx + dy * dy;

                    let force = g_constant * mass[i0] * mass[j] / distance_squared;
                    let acceleration = force / S::floored_distance(distance_squared.sqrt());

                    let half_x = dx * acceleration / S::TWO;
                    let half_y = dy * acceleration / S::TWO;
                    partials.add(i0, half_x, half_y);
                    partials.add(j, -half_x, -half_y);
                }
                i0 += workers;
            }
        });

        store.apply_acceleration_partials(&partials);
    }
}
