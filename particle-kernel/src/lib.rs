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
//! # Particle Kernel
//!
//! A data-oriented kernel for simulating large ensembles of point-mass
//! particles under mutual gravitation, with sub-stepped Verlet-style
//! integration and soft-body collision correction.
//!
//! ## Features
//!
//! - **Struct-of-arrays storage**: flat numeric buffers indexed by particle
//!   id, no per-particle heap objects
//! - **Pairwise gravity**: O(n²) Newtonian accumulation
//! - **Two collision pipelines**: sort-sweep interval bounding and
//!   spatial-hash chunking, selectable at construction
//! - **Fork-join parallelism**: optional Rayon worker pool with
//!   range-partitioned stages and reduction-based commits, no locks
//! - **Configurable precision**: every kernel is generic over `f32`/`f64`
//!
//! ## Example
//!
//! ```rust
//! use particle_kernel::{World, WorldParams, CollisionVariant};
//!
//! let mut params = WorldParams::<f32>::new(64);
//! params.workers = 1;
//! params.collision_variant = CollisionVariant::SortSweep;
//!
//! let mut world = World::new(params).unwrap();
//! for i in 0..64 {
//!     let x = 100.0 + 10.0 * (i % 8) as f32;
//!     let y = 100.0 + 10.0 * (i / 8) as f32;
//!     world.particles_mut().seed(i, x, y, 1.0, 2.0);
//! }
//! world.step();
//! assert_eq!(world.count(), 64);
//! ```

#![warn(missing_docs)]

/// Scalar precision parameter for all kernels
pub mod scalar;

/// Struct-of-arrays particle storage
pub mod store;

/// Fixed-size worker pool and fork-join dispatch helpers
pub mod scheduler;

/// Pairwise gravitational acceleration kernel
pub mod gravity;

/// Verlet-style position integrator
pub mod integrate;

/// World-box boundary constraint
pub mod constraint;

/// Broad-phase and narrow-phase collision pipelines
pub mod collision;

/// Simulation orchestration
pub mod world;

pub use collision::CollisionStrategy;
pub use scalar::Scalar;
pub use scheduler::WorkerPool;
pub use store::ParticleStore;
pub use world::{CollisionVariant, World, WorldParams};
