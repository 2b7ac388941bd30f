// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Uniform and Gaussian variate generation.
//!
//! The shuffled L'Ecuyer combined multiplicative congruential generator,
//! with a Bays-Durham shuffle table and a second interleaved stream. This
//! is a concrete struct rather than a trait object: reproducing the same
//! field from the same seed depends on this exact bit pattern, not on
//! whatever generator happens to be plugged in.

use crate::error::{LasError, LasResult};

const IM1: i64 = 2_147_483_563;
const IM2: i64 = 2_147_483_399;
const IA1: i64 = 40_014;
const IA2: i64 = 40_692;
const IQ1: i64 = 53_668;
const IQ2: i64 = 52_774;
const IR1: i64 = 12_211;
const IR2: i64 = 3_791;
const IMM1: i64 = IM1 - 1;
const NTAB: usize = 32;
const NDIV: i64 = 1 + IMM1 / NTAB as i64;
const AM: f64 = 1.0 / IM1 as f64;
const EPS: f64 = 1.2e-7;
const RNMX: f64 = 1.0 - EPS;

/// State for the shuffled combined multiplicative congruential generator.
///
/// Two integer seeds, a 32-entry shuffle table, a last-value slot, and an
/// initialized flag.
#[derive(Debug, Clone)]
pub struct Prng {
    idum: i64,
    idum2: i64,
    iv: [i64; NTAB],
    iy: i64,
    initialized: bool,
}

impl Default for Prng {
    fn default() -> Self {
        Prng {
            idum: 1,
            idum2: 123_456_789,
            iv: [0; NTAB],
            iy: 0,
            initialized: false,
        }
    }
}

impl Prng {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an already-seeded generator, the common case for callers
    /// that always pass a positive seed up front.
    pub fn with_seed(seed: i64) -> Self {
        let mut prng = Self::default();
        prng.reinit(seed);
        prng
    }

    fn reinit(&mut self, seed: i64) {
        self.idum = seed.max(1);
        self.idum2 = self.idum;
        // Warm up NTAB + 8 steps of the primary stream to load the shuffle
        // table.
        for j in (0..NTAB + 8).rev() {
            let k = self.idum / IQ1;
            self.idum = IA1 * (self.idum - k * IQ1) - k * IR1;
            if self.idum < 0 {
                self.idum += IM1;
            }
            if j < NTAB {
                self.iv[j] = self.idum;
            }
        }
        self.iy = self.iv[0];
        self.initialized = true;
    }

    /// One step of the combined generator, consuming and updating both
    /// streams and the shuffle table.
    fn step(&mut self) -> f64 {
        let k = self.idum / IQ1;
        self.idum = IA1 * (self.idum - k * IQ1) - k * IR1;
        if self.idum < 0 {
            self.idum += IM1;
        }
        let k2 = self.idum2 / IQ2;
        self.idum2 = IA2 * (self.idum2 - k2 * IQ2) - k2 * IR2;
        if self.idum2 < 0 {
            self.idum2 += IM2;
        }
        let j = (self.iy / NDIV) as usize;
        self.iy = self.iv[j] - self.idum2;
        self.iv[j] = self.idum;
        if self.iy < 1 {
            self.iy += IMM1;
        }
        (AM * self.iy as f64).min(RNMX)
    }

    /// `randu(jseed)`: if `jseed > 0` the generator re-seeds with
    /// `max(jseed, 1)` and returns the first shuffled variate; otherwise it
    /// advances one step of the existing stream.
    pub fn randu(&mut self, jseed: i64) -> f64 {
        if jseed > 0 {
            self.reinit(jseed);
        } else if !self.initialized {
            self.reinit(1);
        }
        self.step()
    }

    /// Advances one step without the re-seed check, for code that has
    /// already established the stream is initialized.
    pub fn next(&mut self) -> f64 {
        self.randu(0)
    }

    /// Fills `u` with i.i.d. standard normal variates via the polar
    /// Box-Muller transform. Pairs of variates are generated and
    /// consumed together within this call; when `u.len()` is odd the
    /// second half of the final pair is computed and discarded rather than
    /// carried to a future call.
    pub fn vnorm(&mut self, u: &mut [f64]) -> LasResult<()> {
        if u.is_empty() {
            return Err(LasError::InvalidArgument(
                "vnorm requires a non-empty output slice".to_string(),
            ));
        }
        let n = u.len();
        let mut i = 0;
        while i + 1 < n {
            let (a, b) = self.gaussian_pair();
            u[i] = a;
            u[i + 1] = b;
            i += 2;
        }
        if i < n {
            let (a, _discarded) = self.gaussian_pair();
            u[i] = a;
        }
        Ok(())
    }

    fn gaussian_pair(&mut self) -> (f64, f64) {
        loop {
            let u1 = 2.0 * self.next() - 1.0;
            let u2 = 2.0 * self.next() - 1.0;
            let s = u1 * u1 + u2 * u2;
            if s > 0.0 && s < 1.0 {
                let mul = (-2.0 * s.ln() / s).sqrt();
                return (u1 * mul, u2 * mul);
            }
        }
    }
}
