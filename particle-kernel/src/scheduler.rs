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
//! Fixed-size worker pool with fork-join stage dispatch
//!
//! Every simulation stage is dispatched as a set of independent tasks over
//! shared buffers, and the orchestrator awaits all tasks of a stage before
//! starting the next one. There is no mutual exclusion primitive anywhere in
//! the core: stages that write disjoint index ranges run in place, and
//! stages whose natural write sets overlap (gravity targets, collision
//! displacements) accumulate into per-worker private buffers that are merged
//! in a reduction barrier and committed afterwards.
//!
//! The pool is owned by the orchestrator, never a process-wide global. With
//! the `parallel` feature disabled, every dispatch method degrades to a
//! sequential loop with identical results.

use std::ops::Range;

use crate::scalar::Scalar;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Split `0..len` into `parts` contiguous ranges of near-equal size.
///
/// The first `len % parts` ranges are one element longer, so the union is
/// exactly `0..len` and no two ranges overlap.
pub fn partition_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    assert!(parts > 0, "partition count must be positive");
    let base = len / parts;
    let remainder = len % parts;

    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for k in 0..parts {
        let size = base + usize::from(k < remainder);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// Per-worker private accumulation buffers for one vector field.
///
/// A worker adds its contributions here instead of writing shared particle
/// state directly; after the stage barrier the buffers are merged
/// element-wise and committed once. This replaces the overlapping-write
/// dispatch a naive partition of gravity or chunked collision would need.
pub struct Partials<S: Scalar> {
    /// Accumulated x components.
    pub dx: Vec<S>,
    /// Accumulated y components.
    pub dy: Vec<S>,
}

impl<S: Scalar> Partials<S> {
    /// Zero-filled buffers for `len` particles.
    pub fn zeroed(len: usize) -> Self {
        Partials {
            dx: vec![S::ZERO; len],
            dy: vec![S::ZERO; len],
        }
    }

    /// Buffer length.
    pub fn len(&self) -> usize {
        self.dx.len()
    }

    /// Whether the buffers are empty.
    pub fn is_empty(&self) -> bool {
        self.dx.is_empty()
    }

    /// Add a contribution for particle `i`.
    pub fn add(&mut self, i: usize, vx: S, vy: S) {
        self.dx[i] += vx;
        self.dy[i] += vy;
    }

    /// Element-wise merge of two workers' buffers.
    pub fn merge(mut self, other: Partials<S>) -> Partials<S> {
        debug_assert_eq!(self.len(), other.len());
        for i in 0..self.dx.len() {
            self.dx[i] += other.dx[i];
            self.dy[i] += other.dy[i];
        }
        self
    }
}

/// Fixed-size pool of workers, created once per run.
///
/// Defaults to the host's logical core count. All stage dispatch goes
/// through [`WorkerPool::run_tasks`] (disjoint-range stages) or
/// [`WorkerPool::accumulate`] (reduction stages); both are synchronous
/// fork-join barriers and return only once every task has finished.
///
/// # Examples
///
/// ```
/// use particle_kernel::WorkerPool;
///
/// let pool = WorkerPool::with_workers(2).unwrap();
/// assert_eq!(pool.workers(), 2);
/// assert_eq!(pool.partition(10).len(), 2);
/// ```
pub struct WorkerPool {
    workers: usize,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Create a pool sized to the host's logical core count.
    ///
    /// The non-parallel build always uses a single worker.
    pub fn new() -> Result<Self, String> {
        #[cfg(feature = "parallel")]
        {
            let workers = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            Self::with_workers(workers)
        }
        #[cfg(not(feature = "parallel"))]
        Self::with_workers(1)
    }

    /// Create a pool with an explicit worker count.
    ///
    /// Fails if `workers` is zero or the underlying thread pool cannot be
    /// built.
    pub fn with_workers(workers: usize) -> Result<Self, String> {
        if workers == 0 {
            return Err("worker count must be positive".to_string());
        }

        #[cfg(feature = "parallel")]
        {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|e| format!("failed to build worker pool: {}", e))?;
            Ok(WorkerPool { workers, pool })
        }
        #[cfg(not(feature = "parallel"))]
        Ok(WorkerPool { workers })
    }

    /// Number of workers in the pool.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// One contiguous index range per worker covering `0..len`.
    pub fn partition(&self, len: usize) -> Vec<Range<usize>> {
        partition_ranges(len, self.workers)
    }

    /// Dispatch one task per element of `tasks` and await them all.
    ///
    /// Tasks must write disjoint state; the pool does not check.
    pub fn run_tasks<T, F>(&self, tasks: Vec<T>, task_fn: F)
    where
        T: Send,
        F: Fn(T) + Send + Sync,
    {
        #[cfg(feature = "parallel")]
        self.pool
            .install(|| tasks.into_par_iter().for_each(|task| task_fn(task)));

        #[cfg(not(feature = "parallel"))]
        for task in tasks {
            task_fn(task);
        }
    }

    /// Dispatch accumulation tasks and reduce their private buffers.
    ///
    /// Each element of `tasks` is one worker-sized assignment. The task
    /// function receives a private [`Partials`] buffer of length `out_len`;
    /// after all tasks finish, buffers are merged element-wise and the
    /// result returned for a single commit. This is the lock-free
    /// map/reduce used wherever task write sets would otherwise overlap.
    pub fn accumulate<S, T, F>(&self, out_len: usize, tasks: Vec<T>, task_fn: F) -> Partials<S>
    where
        S: Scalar,
        T: Send,
        F: Fn(T, &mut Partials<S>) + Send + Sync,
    {
        #[cfg(feature = "parallel")]
        {
            self.pool.install(|| {
                tasks
                    .into_par_iter()
                    .map(|task| {
                        let mut partials = Partials::zeroed(out_len);
                        task_fn(task, &mut partials);
                        partials
                    })
                    .reduce(|| Partials::zeroed(out_len), Partials::merge)
            })
        }
        #[cfg(not(feature = "parallel"))]
        {
            let mut partials = Partials::zeroed(out_len);
            for task in tasks {
                task_fn(task, &mut partials);
            }
            partials
        }
    }
}
