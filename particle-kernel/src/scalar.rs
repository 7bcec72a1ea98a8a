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
//! Floating-point width parameter for the simulation kernels
//!
//! Every kernel in this crate is generic over [`Scalar`], so the choice
//! between single and double precision is made once at the type level and
//! never branches inside hot loops. The two widths differ in one physical
//! detail: the single-precision gravity kernel floors the pair distance at 1
//! before dividing, while the double-precision kernel divides undamped.

use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Numeric width used by every per-particle buffer and kernel.
///
/// Implemented for `f32` and `f64`. The ensemble must use one width
/// consistently; mixing widths is prevented by construction since the width
/// is a type parameter of [`crate::ParticleStore`].
pub trait Scalar:
    Copy
    + PartialOrd
    + Default
    + Debug
    + Display
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + 'static
{
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;
    /// The constant two, used by the half-weight accumulation identity.
    const TWO: Self;

    /// Convert from `f64`, rounding as needed.
    fn from_f64(value: f64) -> Self;

    /// Widen to `f64`.
    fn to_f64(self) -> f64;

    /// Square root.
    fn sqrt(self) -> Self;

    /// Largest integer value not greater than `self`.
    fn floor(self) -> Self;

    /// Absolute value.
    fn abs(self) -> Self;

    /// Larger of two values.
    fn max(self, other: Self) -> Self;

    /// Smaller of two values.
    fn min(self, other: Self) -> Self;

    /// Whether the value is neither NaN nor infinite.
    fn is_finite(self) -> bool;

    /// Distance used as the gravity divisor for a pair separated by
    /// `distance`.
    ///
    /// Single precision floors the divisor at 1 so near-coincident pairs do
    /// not blow the acceleration up past representable range; double
    /// precision divides undamped and lets near-zero separations propagate
    /// as ∞/NaN.
    fn floored_distance(distance: Self) -> Self;
}

impl Scalar for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const TWO: Self = 2.0;

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    fn sqrt(self) -> Self {
        f32::sqrt(self)
    }

    fn floor(self) -> Self {
        f32::floor(self)
    }

    fn abs(self) -> Self {
        f32::abs(self)
    }

    fn max(self, other: Self) -> Self {
        f32::max(self, other)
    }

    fn min(self, other: Self) -> Self {
        f32::min(self, other)
    }

    fn is_finite(self) -> bool {
        f32::is_finite(self)
    }

    fn floored_distance(distance: Self) -> Self {
        distance.max(1.0)
    }
}

impl Scalar for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const TWO: Self = 2.0;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn floor(self) -> Self {
        f64::floor(self)
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn max(self, other: Self) -> Self {
        f64::max(self, other)
    }

    fn min(self, other: Self) -> Self {
        f64::min(self, other)
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }

    fn floored_distance(distance: Self) -> Self {
        distance
    }
}
