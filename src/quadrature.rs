// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! 16-point Gauss-Legendre quadrature, the numerical backbone of the
//! covariance-assembly routines.

/// Positive abscissas of the 16-point rule on `[-1, 1]`; the rule is
/// symmetric, so the remaining eight nodes are `-GL16_NODES[i]`.
const GL16_NODES: [f64; 8] = [
    0.095_012_509_837_637_4,
    0.281_603_550_779_258_9,
    0.458_016_777_657_227_4,
    0.617_876_244_402_643_8,
    0.755_404_408_355_003_0,
    0.865_631_202_387_831_8,
    0.944_575_023_073_232_6,
    0.989_400_934_991_649_9,
];

/// Weights paired with [`GL16_NODES`] (shared by the mirrored negative
/// node).
const GL16_WEIGHTS: [f64; 8] = [
    0.189_450_610_455_068_5,
    0.182_603_415_044_923_6,
    0.169_156_519_395_002_5,
    0.149_595_988_816_576_7,
    0.124_628_971_255_533_9,
    0.095_158_511_682_492_8,
    0.062_253_523_938_647_9,
    0.027_152_459_411_754_1,
];

/// Integrates `f` over `[a, b]` with the 16-point Gauss-Legendre rule.
pub fn gauss_legendre16<F: Fn(f64) -> f64>(a: f64, b: f64, f: F) -> f64 {
    let half = (b - a) / 2.0;
    let mid = (a + b) / 2.0;
    let mut sum = 0.0;
    for (x, w) in GL16_NODES.iter().zip(GL16_WEIGHTS.iter()) {
        let dx = half * x;
        sum += w * (f(mid + dx) + f(mid - dx));
    }
    half * sum
}
