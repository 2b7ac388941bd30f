// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Local Average Subdivision (LAS) generator for a zero-mean, homogeneous,
//! Gaussian random field in three dimensions.
//!
//! Given a target grid and a user-supplied point-covariance (or variance)
//! function, [`LasEngine`] produces realizations whose cell values are the
//! local averages of an underlying continuous Gaussian process over each
//! cell, by the recursive subdivision scheme of Fenton & Vanmarcke.
//!
//! ```
//! use las3d::{FnKernel, LasConfig, LasEngine, NullSink};
//!
//! let kernel = FnKernel::new(
//!     |x: f64, y: f64, z: f64| (-2.0 * (x * x + y * y + z * z).sqrt() / 3.0).exp(),
//!     |v1: f64, v2: f64, v3: f64| 1.0 / (1.0 + (v1 + v2 + v3) / 3.0),
//! );
//! let config = LasConfig::new(8, 8, 8, 1.0, 1.0, 1.0, kernel, NullSink);
//! let mut engine = LasEngine::init(config, 12345).unwrap();
//! let mut field = vec![0.0; 8 * 8 * 8];
//! engine.sample(&mut field).unwrap();
//! ```

pub mod config;
pub mod covariance;
pub mod engine;
pub mod error;
pub mod field;
pub mod kernel;
pub mod linalg;
pub mod logsink;
pub mod masks;
pub mod neighborhood;
pub mod prng;
pub mod quadrature;

pub use config::{GridDecomposition, LasConfig};
pub use engine::{EngineStats, LasEngine};
pub use error::{LasError, LasResult};
pub use kernel::{FnKernel, Kernel};
pub use logsink::{LogSink, NullSink, StderrSink};
pub use prng::Prng;
