// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! The user-supplied point-covariance / variance-of-average kernel.
//!
//! The kernel is a trait implemented on a caller-owned value and invoked
//! with its arguments passed explicitly, so two engines can run with two
//! different kernels without sharing state.

/// Point covariance `cov(X, Y, Z)` and variance-of-average `dvfn(V1, V2, V3)`
/// for a zero-mean stationary random field.
///
/// Both callbacks must be octant/quadrant symmetric in their arguments —
/// the quadrature routines in [`crate::covariance`] rely on this to halve
/// their integration domain. No other property is required of `cov` or
/// `dvfn`; they need not even correspond to a valid (positive semidefinite)
/// covariance structure, though a non-PSD kernel will show up downstream as
/// a [`crate::error::LasError::SingularMatrix`] or
/// [`crate::error::LasError::NotPositiveDefinite`].
pub trait Kernel {
    /// Point covariance between two locations separated by lag `(x, y, z)`.
    fn cov(&self, x: f64, y: f64, z: f64) -> f64;

    /// Variance of the local average of the process over a `v1 x v2 x v3`
    /// volume (the point variance times Vanmarcke's spectral gamma
    /// function).
    fn dvfn(&self, v1: f64, v2: f64, v3: f64) -> f64;
}

/// A kernel built from two plain closures, for callers who don't want to
/// define a named type.
pub struct FnKernel<C, D>
where
    C: Fn(f64, f64, f64) -> f64,
    D: Fn(f64, f64, f64) -> f64,
{
    cov: C,
    dvfn: D,
}

impl<C, D> FnKernel<C, D>
where
    C: Fn(f64, f64, f64) -> f64,
    D: Fn(f64, f64, f64) -> f64,
{
    pub fn new(cov: C, dvfn: D) -> Self {
        FnKernel { cov, dvfn }
    }
}

impl<C, D> Kernel for FnKernel<C, D>
where
    C: Fn(f64, f64, f64) -> f64,
    D: Fn(f64, f64, f64) -> f64,
{
    fn cov(&self, x: f64, y: f64, z: f64) -> f64 {
        (self.cov)(x, y, z)
    }

    fn dvfn(&self, v1: f64, v2: f64, v3: f64) -> f64 {
        (self.dvfn)(v1, v2, v3)
    }
}
