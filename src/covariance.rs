// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Covariance assembly: turns a point-covariance/variance kernel into the
//! small dense matrices the rest of the engine conditions on — the
//! stage-0 covariance `R0`, the 3x3x3 parent-neighborhood template `R`,
//! the 8x8 child covariance `B`, and the 27x8 parent-child
//! cross-covariance `S`.
//!
//! All of these reduce to the same shape of integral: the covariance
//! between the local averages of two (possibly differently sized) boxes
//! separated by a center-to-center lag is a triple integral of the point
//! covariance weighted by the per-axis overlap-length function of the two
//! boxes, evaluated with 16-point Gauss-Legendre quadrature.

use crate::kernel::Kernel;
use crate::masks::nbr_index;
use crate::quadrature::gauss_legendre16;

/// Overlap length, as a function of center-to-center shift `u`, of two
/// 1-D intervals of width `da` and `db`. Flat-topped trapezoid: `min(da,
/// db)` at `u = 0`, falling linearly to `0` at `u = (da+db)/2`.
fn overlap_length(da: f64, db: f64, u: f64) -> f64 {
    let lo = (-da / 2.0).max(u - db / 2.0);
    let hi = (da / 2.0).min(u + db / 2.0);
    (hi - lo).max(0.0)
}

/// Covariance of the local averages of two boxes with side lengths `da`
/// and `db` (each a 3-tuple) whose centers are separated by `lag`, by
/// direct 16-point-per-axis Gauss-Legendre quadrature of the point
/// covariance weighted by the per-axis overlap length.
fn local_average_covariance(kernel: &dyn Kernel, da: [f64; 3], db: [f64; 3], lag: [f64; 3]) -> f64 {
    let half_extent = |i: usize| (da[i] + db[i]) / 2.0;
    let integrand = |u: f64, v: f64, w: f64| {
        overlap_length(da[0], db[0], u)
            * overlap_length(da[1], db[1], v)
            * overlap_length(da[2], db[2], w)
            * kernel.cov(u + lag[0], v + lag[1], w + lag[2])
    };
    let triple = gauss_legendre16(-half_extent(0), half_extent(0), |u| {
        gauss_legendre16(-half_extent(1), half_extent(1), |v| {
            gauss_legendre16(-half_extent(2), half_extent(2), |w| integrand(u, v, w))
        })
    });
    triple / (da[0] * da[1] * da[2] * db[0] * db[1] * db[2])
}

/// Covariance between two equal-size `(D1, D2, D3)` local averages whose
/// centers are separated by `(C1*D1, C2*D2, C3*D3)`. When the lag is zero
/// this is by definition the variance of a single `(D1, D2, D3)` average,
/// so the whole triple quadrature is skipped in favor of a direct,
/// cheaper call to `kernel.dvfn` for the zero-lag case.
pub fn dcvaa3(kernel: &dyn Kernel, d1: f64, d2: f64, d3: f64, c1: f64, c2: f64, c3: f64) -> f64 {
    if c1 == 0.0 && c2 == 0.0 && c3 == 0.0 {
        return kernel.dvfn(d1, d2, d3);
    }
    let d = [d1, d2, d3];
    let lag = [c1 * d1, c2 * d2, c3 * d3];
    local_average_covariance(kernel, d, d, lag)
}

/// Cross-covariance between a parent cell of side `(D1, D2, D3)` and a
/// child cell of side `(D1/2, D2/2, D3/2)` whose center is offset from the
/// parent's by `(C1, C2, C3)` child-cell-widths.
pub fn dcvab3(kernel: &dyn Kernel, d1: f64, d2: f64, d3: f64, c1: f64, c2: f64, c3: f64) -> f64 {
    let da = [d1, d2, d3];
    let db = [d1 / 2.0, d2 / 2.0, d3 / 2.0];
    let lag = [c1 * db[0], c2 * db[1], c3 * db[2]];
    local_average_covariance(kernel, da, db, lag)
}

/// The relative center position, in units of cell width, of each of the
/// 27 positions in the flattened 3x3x3 neighborhood (`nbr_index`).
fn neighborhood_offsets() -> [[f64; 3]; 27] {
    let mut out = [[0.0; 3]; 27];
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                out[nbr_index(dx, dy, dz)] = [dx as f64, dy as f64, dz as f64];
            }
        }
    }
    out
}

/// The relative center position, in units of child-cell width, of each of
/// the 8 children in a 2x2x2 octet (child index `(cx, cy, cz) in {0,1}^3`,
/// `cx` fastest, matching the Field buffer's x-fastest layout).
fn child_offsets() -> [[f64; 3]; 8] {
    let mut out = [[0.0; 3]; 8];
    for cz in 0..2 {
        for cy in 0..2 {
            for cx in 0..2 {
                let idx = cx + 2 * cy + 4 * cz;
                out[idx] = [
                    if cx == 0 { -0.5 } else { 0.5 },
                    if cy == 0 { -0.5 } else { 0.5 },
                    if cz == 0 { -0.5 } else { 0.5 },
                ];
            }
        }
    }
    out
}

/// Fills the `kk x kk` (`kk = k1*k2*k3`) stage-0 covariance matrix between
/// every pair of coarse cells, and the 27x27 template `R` of covariances
/// among a 3x3x3 parent neighborhood at cell size `(T1, T2, T3)`. `R0` is
/// returned flattened column-major, `kk` per side.
pub fn dcvit3(
    kernel: &dyn Kernel,
    k1: usize,
    k2: usize,
    k3: usize,
    t1: f64,
    t2: f64,
    t3: f64,
) -> (Vec<f64>, [[f64; 27]; 27]) {
    let kk = k1 * k2 * k3;
    let mut r0 = vec![0.0; kk * kk];
    let centers: Vec<[f64; 3]> = (0..kk)
        .map(|idx| {
            let i = idx % k1;
            let j = (idx / k1) % k2;
            let k = idx / (k1 * k2);
            [
                i as f64 - (k1 as f64 - 1.0) / 2.0,
                j as f64 - (k2 as f64 - 1.0) / 2.0,
                k as f64 - (k3 as f64 - 1.0) / 2.0,
            ]
        })
        .collect();
    for p in 0..kk {
        for q in 0..kk {
            let dp = centers[p];
            let dq = centers[q];
            let value = dcvaa3(
                kernel,
                t1,
                t2,
                t3,
                dp[0] - dq[0],
                dp[1] - dq[1],
                dp[2] - dq[2],
            );
            r0[p + q * kk] = value;
        }
    }

    let r = neighborhood_template(kernel, t1, t2, t3);
    (r0, r)
}

/// The 27x27 parent-neighborhood covariance template at cell size
/// `(T1, T2, T3)`, shared by `dcvit3` and `dcvmt3`.
fn neighborhood_template(kernel: &dyn Kernel, t1: f64, t2: f64, t3: f64) -> [[f64; 27]; 27] {
    let offsets = neighborhood_offsets();
    let mut r = [[0.0; 27]; 27];
    for a in 0..27 {
        for b in 0..27 {
            let oa = offsets[a];
            let ob = offsets[b];
            r[a][b] = dcvaa3(kernel, t1, t2, t3, oa[0] - ob[0], oa[1] - ob[1], oa[2] - ob[2]);
        }
    }
    r
}

/// Fills the 8x8 child covariance `B`, the 27x8 parent-child
/// cross-covariance `S`, and — when `lform_r` is set — the 27x27
/// covariance template `R` for the *next* subdivision level (cell size
/// `(T1/2, T2/2, T3/2)`).
pub fn dcvmt3(
    kernel: &dyn Kernel,
    t1: f64,
    t2: f64,
    t3: f64,
    lform_r: bool,
) -> ([[f64; 8]; 8], [[f64; 8]; 27], Option<[[f64; 27]; 27]>) {
    let children = child_offsets();
    let parents = neighborhood_offsets();

    let mut b = [[0.0; 8]; 8];
    for a in 0..8 {
        for c in 0..8 {
            let ca = children[a];
            let cc = children[c];
            b[a][c] = dcvaa3(
                kernel,
                t1 / 2.0,
                t2 / 2.0,
                t3 / 2.0,
                ca[0] - cc[0],
                ca[1] - cc[1],
                ca[2] - cc[2],
            );
        }
    }

    let mut s = [[0.0; 8]; 27];
    for p in 0..27 {
        for c in 0..8 {
            let po = parents[p];
            let co = children[c];
            // dcvab3's C_i is a lag in child-cell-width units; parent
            // offsets are in parent-cell-width units (2 child widths).
            s[p][c] = dcvab3(
                kernel,
                t1,
                t2,
                t3,
                co[0] - 2.0 * po[0],
                co[1] - 2.0 * po[1],
                co[2] - 2.0 * po[2],
            );
        }
    }

    let r_next = if lform_r {
        Some(neighborhood_template(kernel, t1 / 2.0, t2 / 2.0, t3 / 2.0))
    } else {
        None
    };

    (b, s, r_next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::FnKernel;

    fn unit_variance_kernel() -> FnKernel<impl Fn(f64, f64, f64) -> f64, impl Fn(f64, f64, f64) -> f64> {
        FnKernel::new(|_x: f64, _y: f64, _z: f64| 0.0, |_v1, _v2, _v3| 1.0)
    }

    fn exponential_kernel(theta: f64) -> FnKernel<impl Fn(f64, f64, f64) -> f64, impl Fn(f64, f64, f64) -> f64> {
        FnKernel::new(
            move |x: f64, y: f64, z: f64| (-2.0 * (x * x + y * y + z * z).sqrt() / theta).exp(),
            move |v1: f64, v2: f64, v3: f64| 1.0 / (1.0 + (v1 + v2 + v3) / theta),
        )
    }

    #[test]
    fn dcvaa3_zero_lag_variance_is_positive_and_at_most_point_variance() {
        let kernel = exponential_kernel(4.0);
        let v = dcvaa3(&kernel, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0);
        assert!(v > 0.0 && v <= 1.0 + 1e-9);
    }

    #[test]
    fn dcvaa3_decays_with_separation() {
        let kernel = exponential_kernel(2.0);
        let near = dcvaa3(&kernel, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0);
        let far = dcvaa3(&kernel, 1.0, 1.0, 1.0, 4.0, 0.0, 0.0);
        assert!(near > far);
        assert!(far >= 0.0);
    }

    #[test]
    fn neighborhood_template_is_symmetric() {
        let kernel = exponential_kernel(3.0);
        let r = neighborhood_template(&kernel, 1.0, 1.0, 1.0);
        for a in 0..27 {
            for b in 0..27 {
                assert!((r[a][b] - r[b][a]).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn child_covariance_diagonal_matches_zero_lag() {
        let kernel = exponential_kernel(3.0);
        let (b, _s, _r) = dcvmt3(&kernel, 1.0, 1.0, 1.0, false);
        let expected = dcvaa3(&kernel, 0.5, 0.5, 0.5, 0.0, 0.0, 0.0);
        for i in 0..8 {
            assert!((b[i][i] - expected).abs() < 1e-10);
        }
    }

    #[test]
    fn stage0_covariance_is_symmetric_positive_diagonal() {
        let kernel = exponential_kernel(2.0);
        let (r0, _r) = dcvit3(&kernel, 2, 2, 2, 0.5, 0.5, 0.5);
        let kk = 8;
        for p in 0..kk {
            assert!(r0[p + p * kk] > 0.0);
            for q in 0..kk {
                assert!((r0[p + q * kk] - r0[q + p * kk]).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn degenerate_kernel_gives_unit_variance_no_correlation() {
        let kernel = unit_variance_kernel();
        let v0 = dcvaa3(&kernel, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0);
        let v1 = dcvaa3(&kernel, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0);
        assert!((v0 - 1.0).abs() < 1e-9);
        assert!(v1.abs() < 1e-9);
    }
}
