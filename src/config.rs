// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Process configuration and the grid decomposition procedure (`las3i`
//! step 1) that splits a target grid into a coarse `(k1, k2, k3)` cell and
//! a subdivision count `m`.

use crate::error::{LasError, LasResult};
use crate::kernel::Kernel;
use crate::logsink::LogSink;

/// Caller-supplied, immutable-once-validated configuration for a
/// [`crate::engine::LasEngine`].
pub struct LasConfig<K: Kernel, L: LogSink> {
    pub n1: usize,
    pub n2: usize,
    pub n3: usize,
    pub xl: f64,
    pub yl: f64,
    pub zl: f64,
    pub m_max: u32,
    pub k_max: usize,
    pub tol: f64,
    pub kernel: K,
    pub log: L,
}

impl<K: Kernel, L: LogSink> LasConfig<K, L> {
    /// Builds a configuration with the default subdivision limits
    /// (`M_MAX = 6`, `K_MAX = 512`, `tol = 1e-3`).
    pub fn new(n1: usize, n2: usize, n3: usize, xl: f64, yl: f64, zl: f64, kernel: K, log: L) -> Self {
        LasConfig {
            n1,
            n2,
            n3,
            xl,
            yl,
            zl,
            m_max: 6,
            k_max: 512,
            tol: 1e-3,
            kernel,
            log,
        }
    }

    fn validate(&self) -> LasResult<()> {
        if self.n1 == 0 || self.n2 == 0 || self.n3 == 0 {
            return Err(LasError::InvalidArgument(format!(
                "grid dimensions must be positive, got ({}, {}, {})",
                self.n1, self.n2, self.n3
            )));
        }
        if self.xl <= 0.0 || self.yl <= 0.0 || self.zl <= 0.0 {
            return Err(LasError::InvalidArgument(format!(
                "physical extents must be positive, got ({}, {}, {})",
                self.xl, self.yl, self.zl
            )));
        }
        Ok(())
    }
}

/// The (k1, k2, k3, m) decomposition of a target grid: `N_i = k_i * 2^m`
/// with `k1*k2*k3 <= K_MAX` and `m <= M_MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDecomposition {
    pub k1: usize,
    pub k2: usize,
    pub k3: usize,
    pub m: u32,
}

/// Finds the smallest `m` (trying `m = 0, 1, ..., m_max`) at which halving
/// `(N1, N2, N3)` that many times yields `k1*k2*k3 <= k_max`, failing with
/// [`LasError::IncompatibleGrid`] if an odd `k_i` is reached first or no
/// acceptable `m` exists.
pub fn decompose_grid(n1: usize, n2: usize, n3: usize, k_max: usize, m_max: u32) -> LasResult<GridDecomposition> {
    let mut k1 = n1;
    let mut k2 = n2;
    let mut k3 = n3;
    let mut m = 0;
    loop {
        if k1 * k2 * k3 <= k_max {
            return Ok(GridDecomposition { k1, k2, k3, m });
        }
        if m >= m_max {
            return Err(LasError::IncompatibleGrid {
                n1,
                n2,
                n3,
                k_max,
                m_max,
            });
        }
        if k1 % 2 != 0 || k2 % 2 != 0 || k3 % 2 != 0 {
            return Err(LasError::IncompatibleGrid {
                n1,
                n2,
                n3,
                k_max,
                m_max,
            });
        }
        k1 /= 2;
        k2 /= 2;
        k3 /= 2;
        m += 1;
    }
}

/// Validates `config` and computes its grid decomposition; the combined
/// entry point [`crate::engine::LasEngine::init`] calls before doing
/// anything else.
pub fn validate_and_decompose<K: Kernel, L: LogSink>(config: &LasConfig<K, L>) -> LasResult<GridDecomposition> {
    config.validate()?;
    decompose_grid(config.n1, config.n2, config.n3, config.k_max, config.m_max)
}
