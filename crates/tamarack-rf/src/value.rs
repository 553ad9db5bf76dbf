//! Feature element types accepted by the engine.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// A numeric feature element type.
///
/// Sealed: implemented for `f32` and `f64` only. Impurities are computed in
/// the same precision as the feature data, so the trait carries the small
/// amount of arithmetic the split search needs.
pub trait Value:
    sealed::Sealed
    + Copy
    + PartialOrd
    + PartialEq
    + Send
    + Sync
    + fmt::Debug
    + fmt::Display
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + serde::Serialize
    + serde::de::DeserializeOwned
    + 'static
{
    /// The additive identity.
    const ZERO: Self;
    /// The multiplicative identity.
    const ONE: Self;
    /// Positive infinity, used as the impurity of an invalid split.
    const INFINITY: Self;

    /// Lossy conversion from a count.
    fn from_count(count: usize) -> Self;

    /// Lossy conversion from `f64`, used for configuration thresholds.
    fn from_f64(value: f64) -> Self;

    /// Widen to `f64`, used for reporting.
    fn to_f64(self) -> f64;

    /// Returns `true` iff the value is a NaN.
    fn is_nan(self) -> bool;
}

impl Value for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const INFINITY: Self = f32::INFINITY;

    #[inline]
    fn from_count(count: usize) -> Self {
        count as f32
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
}

impl Value for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;
    const INFINITY: Self = f64::INFINITY;

    #[inline]
    fn from_count(count: usize) -> Self {
        count as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
}
