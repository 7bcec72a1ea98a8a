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
//! World-box boundary constraint
//!
//! Positions are clamped into `[margin, world_size − margin)` per axis.
//! Out-of-range values snap to the boundary; there is no reflection and no
//! momentum change, so a particle arriving at the wall simply loses the
//! out-of-box part of its implicit velocity on the next integration.

use crate::scalar::Scalar;
use crate::scheduler::WorkerPool;
use crate::store::ParticleStore;

/// Axis-aligned clamp into the world box.
///
/// The margin is a fixed inset on every side, typically either a fixed
/// particle-radius allowance or zero.
pub struct BoundaryConstraint<S: Scalar> {
    lower: S,
    upper: S,
}

impl<S: Scalar> BoundaryConstraint<S> {
    /// Create a constraint for a square world of side `world_size` with the
    /// given inset `margin`.
    ///
    /// # Panics
    ///
    /// Panics if the margin is negative or leaves no interior.
    pub fn new(world_size: S, margin: S) -> Self {
        assert!(
            margin >= S::ZERO && margin.is_finite(),
            "Boundary margin must be non-negative and finite"
        );
        assert!(
            world_size - margin > margin,
            "World size must leave an interior beyond the margin"
        );
        BoundaryConstraint {
            lower: margin,
            upper: world_size - margin,
        }
    }

    /// Smallest admissible coordinate.
    pub fn lower(&self) -> S {
        self.lower
    }

    /// Largest admissible coordinate.
    pub fn upper(&self) -> S {
        self.upper
    }

    /// Clamp one range of positions in place.
    pub fn clamp_slice(&self, x: &mut [S], y: &mut [S]) {
        for i in 0..x.len() {
            if x[i] > self.upper {
                x[i] = self.upper;
            }
            if x[i] < self.lower {
                x[i] = self.lower;
            }
            if y[i] > self.upper {
                y[i] = self.upper;
            }
            if y[i] < self.lower {
                y[i] = self.lower;
            }
        }
    }

    /// Clamp the whole ensemble across the pool.
    pub fn apply(&self, store: &mut ParticleStore<S>, pool: &WorkerPool) {
        let slices = store.position_slices(pool.workers());
        pool.run_tasks(slices, |(x, y)| self.clamp_slice(x, y));
    }
}
