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
//! Simulation orchestration
//!
//! [`World`] owns the particle store, the worker pool, and one instance of
//! every stage kernel, and drives a tick as
//!
//! ```text
//! gravity → integrate → (collision-resolve → constrain → integrate) × sub-steps
//! ```
//!
//! with a fork-join barrier between stages. All simulation constants are
//! immutable after construction. A stage failure is caught at the top of the
//! tick and logged; the tick is then considered complete, possibly with
//! unmodified state, rather than retried or escalated.

use crate::collision::hash_grid::SpatialHashStrategy;
use crate::collision::sweep::SortSweepStrategy;
use crate::collision::CollisionStrategy;
use crate::constraint::BoundaryConstraint;
use crate::gravity::{GravityKernel, DEFAULT_G_CONSTANT};
use crate::integrate::integrate;
use crate::scalar::Scalar;
use crate::scheduler::WorkerPool;
use crate::store::ParticleStore;

/// Which broad-phase/narrow-phase pipeline the world runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionVariant {
    /// Sort particle ids by x and sweep bounding intervals.
    SortSweep,
    /// Bucket particles into grid chunks and test 3×3 neighborhoods.
    SpatialHash,
}

/// Immutable simulation constants.
///
/// Only `particles_count` is required; every other field starts from the
/// stock configuration and can be overwritten before the world is built.
///
/// # Examples
///
/// ```
/// use particle_kernel::{CollisionVariant, WorldParams};
///
/// let mut params = WorldParams::<f64>::new(128);
/// params.sub_stepping = 4;
/// params.collision_variant = CollisionVariant::SpatialHash;
/// assert_eq!(params.world_size, 1024.0);
/// ```
pub struct WorldParams<S: Scalar> {
    /// Ensemble size, fixed for the run.
    pub particles_count: usize,
    /// Side length of the square world box.
    pub world_size: S,
    /// Gravitational constant.
    pub g_constant: S,
    /// Number of resolve/constrain/integrate passes per tick.
    pub sub_stepping: u32,
    /// Tick time delta; each sub-step advances `time_delta / sub_stepping`.
    pub time_delta: S,
    /// Fraction of geometric penetration corrected per collision pass.
    pub collide_responsibility: S,
    /// Grid cell side for the spatial-hash variant.
    pub chunk_size: S,
    /// Inset from the world edge the boundary constraint clamps into.
    pub boundary_margin: S,
    /// Whether collision resolution runs at all.
    pub resolve_collisions: bool,
    /// Broad-phase variant to build.
    pub collision_variant: CollisionVariant,
    /// Per-worker pair buffer capacity in u32 slots (sort-sweep variant);
    /// 0 picks an automatic size.
    pub pair_capacity: usize,
    /// Worker count; 0 sizes the pool to the host's logical cores.
    pub workers: usize,
}

impl<S: Scalar> WorldParams<S> {
    /// Stock configuration for `particles_count` particles.
    pub fn new(particles_count: usize) -> Self {
        WorldParams {
            particles_count,
            world_size: S::from_f64(1024.0),
            g_constant: S::from_f64(DEFAULT_G_CONSTANT),
            sub_stepping: 8,
            time_delta: S::from_f64(0.01),
            collide_responsibility: S::from_f64(0.5),
            chunk_size: S::from_f64(16.0),
            boundary_margin: S::from_f64(25.0),
            resolve_collisions: true,
            collision_variant: CollisionVariant::SortSweep,
            pair_capacity: 0,
            workers: 0,
        }
    }
}

/// One simulation run: store, pool, stage kernels, and constants.
///
/// # Examples
///
/// ```
/// use particle_kernel::{World, WorldParams};
///
/// let mut params = WorldParams::<f32>::new(4);
/// params.workers = 1;
/// let mut world = World::new(params).unwrap();
///
/// for i in 0..4 {
///     let offset = 100.0 + 10.0 * i as f32;
///     world.particles_mut().seed(i, offset, 100.0, 1.0, 2.0);
/// }
/// world.step();
/// assert!(world.x().iter().all(|x| x.is_finite()));
/// ```
pub struct World<S: Scalar> {
    store: ParticleStore<S>,
    pool: WorkerPool,
    gravity: GravityKernel<S>,
    constraint: BoundaryConstraint<S>,
    strategy: Box<dyn CollisionStrategy<S>>,
    sub_stepping: u32,
    time_delta_subbed: S,
    collide_responsibility: S,
    resolve_collisions: bool,
}

impl<S: Scalar> World<S> {
    /// Build a world from `params`.
    ///
    /// Configuration errors are fatal here: a non-positive particle count,
    /// a count not divisible by the worker count (parallel build), a
    /// non-positive time delta or sub-step count, or a margin that leaves
    /// no interior.
    pub fn new(params: WorldParams<S>) -> Result<Self, String> {
        if params.sub_stepping == 0 {
            return Err("sub-step count must be positive".to_string());
        }
        if !(params.time_delta > S::ZERO) || !params.time_delta.is_finite() {
            return Err("time delta must be positive and finite".to_string());
        }
        if !(params.collide_responsibility > S::ZERO) || !params.collide_responsibility.is_finite()
        {
            return Err("collision responsibility must be positive and finite".to_string());
        }
        if !(params.g_constant >= S::ZERO) || !params.g_constant.is_finite() {
            return Err("gravitational constant must be non-negative and finite".to_string());
        }
        if !(params.boundary_margin >= S::ZERO) || !params.boundary_margin.is_finite() {
            return Err("boundary margin must be non-negative and finite".to_string());
        }
        if !(params.world_size - params.boundary_margin > params.boundary_margin) {
            return Err("world size must leave an interior beyond the margin".to_string());
        }
        if !(params.chunk_size > S::ZERO) || !params.chunk_size.is_finite() {
            return Err("chunk size must be positive and finite".to_string());
        }

        let pool = if params.workers == 0 {
            WorkerPool::new()?
        } else {
            WorkerPool::with_workers(params.workers)?
        };
        let store = ParticleStore::for_pool(params.particles_count, &pool)?;

        let strategy: Box<dyn CollisionStrategy<S>> = match params.collision_variant {
            CollisionVariant::SortSweep => Box::new(SortSweepStrategy::new(
                params.particles_count,
                pool.workers(),
                params.pair_capacity,
            )),
            CollisionVariant::SpatialHash => Box::new(SpatialHashStrategy::new(
                params.world_size,
                params.chunk_size,
            )),
        };

        let time_delta_subbed =
            params.time_delta / S::from_f64(f64::from(params.sub_stepping));

        Ok(World {
            store,
            pool,
            gravity: GravityKernel::new(params.g_constant),
            constraint: BoundaryConstraint::new(params.world_size, params.boundary_margin),
            strategy,
            sub_stepping: params.sub_stepping,
            time_delta_subbed,
            collide_responsibility: params.collide_responsibility,
            resolve_collisions: params.resolve_collisions,
        })
    }

    /// Run one simulation tick.
    ///
    /// Failures are logged and swallowed; the tick never propagates an
    /// error to the caller.
    pub fn step(&mut self) {
        if let Err(error) = self.run_tick() {
            log::error!("simulation tick failed: {}", error);
        }
    }

    fn run_tick(&mut self) -> Result<(), String> {
        let chunk_size = self.strategy.chunk_size();

        self.gravity.accumulate(&mut self.store, &self.pool);
        integrate(&mut self.store, &self.pool, self.time_delta_subbed, chunk_size);

        for _ in 0..self.sub_stepping {
            if self.resolve_collisions {
                self.strategy
                    .resolve(&mut self.store, &self.pool, self.collide_responsibility)?;
            }
            self.constraint.apply(&mut self.store, &self.pool);
            integrate(&mut self.store, &self.pool, self.time_delta_subbed, chunk_size);
        }

        Ok(())
    }

    /// Number of particles in the ensemble.
    pub fn count(&self) -> usize {
        self.store.count()
    }

    /// Current x positions, for rendering collaborators.
    pub fn x(&self) -> &[S] {
        self.store.x()
    }

    /// Current y positions, for rendering collaborators.
    pub fn y(&self) -> &[S] {
        self.store.y()
    }

    /// Collision radii, for rendering collaborators.
    pub fn radius(&self) -> &[S] {
        self.store.radius()
    }

    /// Particle masses, for rendering collaborators.
    pub fn mass(&self) -> &[S] {
        self.store.mass()
    }

    /// The underlying particle store.
    pub fn particles(&self) -> &ParticleStore<S> {
        &self.store
    }

    /// Mutable access to the store, for scenario setup.
    pub fn particles_mut(&mut self) -> &mut ParticleStore<S> {
        &mut self.store
    }

    /// The worker pool driving this run.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Per-sub-step time delta.
    pub fn time_delta_subbed(&self) -> S {
        self.time_delta_subbed
    }

    /// Name of the collision variant in use.
    pub fn collision_variant_name(&self) -> &str {
        self.strategy.name()
    }
}
