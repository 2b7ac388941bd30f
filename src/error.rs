// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Error taxonomy for the LAS engine.
//!
//! `NumericalWarning` from the design is deliberately not a variant here:
//! per the Cholesky contract (see [`crate::linalg::dchol2`]) a relative
//! error above tolerance is reported through the log sink and the call
//! still returns a usable factor, it never aborts the operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LasError {
    #[error(
        "grid ({n1}, {n2}, {n3}) has no decomposition with k1*k2*k3 <= {k_max} and m <= {m_max}"
    )]
    IncompatibleGrid {
        n1: usize,
        n2: usize,
        n3: usize,
        k_max: usize,
        m_max: usize,
    },

    #[error("symmetric indefinite factorization encountered an exact zero pivot at index {index}")]
    SingularMatrix { index: usize },

    #[error("Cholesky factorization encountered a non-positive pivot at index {index}")]
    NotPositiveDefinite { index: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type LasResult<T> = Result<T, LasError>;
