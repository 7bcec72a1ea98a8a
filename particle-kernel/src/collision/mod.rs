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
//! Collision detection and resolution
//!
//! Collision handling is split into a broad phase that produces candidate
//! pairs cheaply and a narrow phase that performs the exact overlap test and
//! positional correction. Two broad-phase variants are provided:
//!
//! - [`sweep::SortSweepStrategy`]: sort particles by x and sweep bounding
//!   intervals, emitting candidate pairs into per-worker buffers
//! - [`hash_grid::SpatialHashStrategy`]: bucket particles into grid chunks
//!   and test all pairs within each 3×3 neighborhood
//!
//! The variant is chosen once at world construction through the
//! [`CollisionStrategy`] trait object, so hot loops never branch on it.
//!
//! # Narrow phase
//!
//! The correction is purely positional (no impulse, no velocity change):
//! a penetrating pair is pushed apart along the line of centers by a
//! configurable fraction of the overlap, split between the two particles in
//! inverse proportion to their masses, so the heavier particle absorbs the
//! smaller share of the correction.

use crate::scalar::Scalar;
use crate::scheduler::{Partials, WorkerPool};
use crate::store::{ContactView, ParticleStore};

pub mod hash_grid;
pub mod sweep;

/// A broad-phase/narrow-phase pipeline run once per sub-step.
pub trait CollisionStrategy<S: Scalar>: Send {
    /// Human-readable variant name, for logs.
    fn name(&self) -> &str;

    /// Chunk size the integrator should refresh bucket ids with, if the
    /// variant consumes them.
    fn chunk_size(&self) -> Option<S> {
        None
    }

    /// Detect and correct all penetrating pairs in `store`.
    fn resolve(
        &mut self,
        store: &mut ParticleStore<S>,
        pool: &WorkerPool,
        responsibility: S,
    ) -> Result<(), String>;
}

/// Displacement a single penetrating pair should receive.
struct PairCorrection<S> {
    i_dx: S,
    i_dy: S,
    j_dx: S,
    j_dy: S,
}

/// Exact overlap test and correction amounts for one candidate pair.
///
/// Returns `None` when the pair is not penetrating or `i == j`. A
/// coincident pair (distance zero) divides by zero and produces NaN
/// displacements; this propagates into position state by design.
fn pair_correction<S: Scalar>(
    responsibility: S,
    i: usize,
    j: usize,
    x: &[S],
    y: &[S],
    mass: &[S],
    radius: &[S],
) -> Option<PairCorrection<S>> {
    if i == j {
        return None;
    }

    let separation_x = x[i] - x[j];
    let separation_y = y[i] - y[j];
    let distance_squared = separation_x * separation_x + separation_y * separation_y;
    let distance_minimal = radius[i] + radius[j];

    if distance_squared > distance_minimal * distance_minimal {
        return None;
    }

    let distance = distance_squared.sqrt();
    let diff_x = separation_x / distance;
    let diff_y = separation_y / distance;

    let common_mass = mass[i] + mass[j];
    let mass_ratio_i = mass[i] / common_mass;
    let mass_ratio_j = mass[j] / common_mass;

    // Negative while penetrating, so each particle moves outward along the
    // line of centers.
    let delta = responsibility * (distance - distance_minimal);

    Some(PairCorrection {
        i_dx: -(diff_x * mass_ratio_j * delta) / S::TWO,
        i_dy: -(diff_y * mass_ratio_j * delta) / S::TWO,
        j_dx: (diff_x * mass_ratio_i * delta) / S::TWO,
        j_dy: (diff_y * mass_ratio_i * delta) / S::TWO,
    })
}

/// Resolve one candidate pair directly against shared position state.
///
/// This is the single-task form; concurrent tasks resolving pairs that
/// share a particle would race on its position, so pool dispatch goes
/// through [`accumulate_pair`] instead.
pub fn resolve_pair_in_place<S: Scalar>(
    responsibility: S,
    i: usize,
    j: usize,
    view: &mut ContactView<'_, S>,
) {
    if let Some(correction) = pair_correction(responsibility, i, j, view.x, view.y, view.mass, view.radius) {
        view.x[i] += correction.i_dx;
        view.y[i] += correction.i_dy;
        view.x[j] += correction.j_dx;
        view.y[j] += correction.j_dy;
    }
}

/// Fold one candidate pair's correction into a worker's private buffer.
///
/// Workers call this during the narrow phase; the buffers are merged at the
/// stage barrier and committed to the store once.
pub fn accumulate_pair<S: Scalar>(
    responsibility: S,
    i: usize,
    j: usize,
    x: &[S],
    y: &[S],
    mass: &[S],
    radius: &[S],
    partials: &mut Partials<S>,
) {
    if let Some(correction) = pair_correction(responsibility, i, j, x, y, mass, radius) {
        partials.add(i, correction.i_dx, correction.i_dy);
        partials.add(j, correction.j_dx, correction.j_dy);
    }
}
