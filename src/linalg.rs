// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Dense linear algebra kernels: symmetric indefinite factorization with
//! diagonal pivoting (Bunch-Kaufman) and its solver, Cholesky
//! factorization of a symmetric positive-definite matrix with a reported
//! relative residual, and the handful of vector primitives the
//! factorizations are built from.
//!
//! Matrices are square, stored as a flat column-major buffer of length
//! `n * n` (`a[i + j * n]`), the layout `dsifa`/`dchol2` operate on
//! directly. Only `dsifa` touches the upper triangle; `dchol2` only the
//! lower triangle.

use crate::error::{LasError, LasResult};

/// y <- y, x <- x, with x[i] and x[j] swapped. Level-1 BLAS `dswap`.
pub fn dswap(x: &mut [f64], i: usize, j: usize) {
    x.swap(i, j);
}

/// y <- y + alpha * x over a common range, Level-1 BLAS `daxpy`.
pub fn daxpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// Level-1 BLAS `ddot`.
pub fn ddot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}

/// Index of the largest-magnitude element, Level-1 BLAS `idamax`. Returns
/// `None` for an empty slice.
pub fn idamax(x: &[f64]) -> Option<usize> {
    x.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.abs().partial_cmp(&b.abs()).unwrap())
        .map(|(i, _)| i)
}

#[inline]
fn at(n: usize, i: usize, j: usize) -> usize {
    i + j * n
}

/// Bunch-Kaufman diagonal-pivoting factorization of a real symmetric
/// matrix `a` (upper triangle, column-major, order `n`) into `U D U^T`
/// with 1x1 and 2x2 diagonal blocks. `a` is overwritten with the factor in
/// place; returns the pivot vector (1-based entry values, LINPACK style:
/// a positive `ipvt[k] == k+1` marks a 1x1 block, a negative value marks
/// one half of a 2x2 block sharing a pivot with its neighbor).
///
/// Fails with [`LasError::SingularMatrix`] the first time a pivot column
/// is found to be exactly zero.
pub fn dsifa(a: &mut [f64], n: usize) -> LasResult<Vec<i32>> {
    assert_eq!(a.len(), n * n);
    let alpha = (1.0 + 17.0_f64.sqrt()) / 8.0;
    let mut ipvt = vec![0i32; n];
    let mut info: Option<usize> = None;

    let mut k = n; // 1-based "current top of the unreduced block", like the Fortran loop
    while k >= 1 {
        let kk = k - 1; // 0-based index of the pivot column currently under consideration
        let mut kstep;
        let absakk = a[at(n, kk, kk)].abs();

        let (imax, colmax) = if kk > 0 {
            let col = (0..kk)
                .map(|i| a[at(n, i, kk)])
                .collect::<Vec<_>>();
            let imax = idamax(&col).unwrap();
            (imax, col[imax].abs())
        } else {
            (0, 0.0)
        };

        if absakk.max(colmax) == 0.0 {
            ipvt[kk] = k as i32;
            if info.is_none() {
                info = Some(kk);
            }
            k -= 1;
            continue;
        }

        let pivot_row;
        let do_swap;
        if absakk >= alpha * colmax {
            kstep = 1;
            pivot_row = kk;
            do_swap = false;
        } else {
            let mut rowmax = 0.0;
            for j in (imax + 1)..kk {
                rowmax = rowmax.max(a[at(n, imax, j)].abs());
            }
            if imax > 0 {
                let row = (0..imax).map(|i| a[at(n, i, imax)]).collect::<Vec<_>>();
                let jmax = idamax(&row).unwrap();
                rowmax = rowmax.max(row[jmax].abs());
            }
            if a[at(n, imax, imax)].abs() >= alpha * rowmax {
                kstep = 1;
                pivot_row = imax;
                do_swap = true;
            } else if rowmax > 0.0 && absakk >= alpha * colmax * (colmax / rowmax) {
                kstep = 1;
                pivot_row = kk;
                do_swap = false;
            } else {
                kstep = 2;
                pivot_row = imax;
                do_swap = imax != kk - 1;
            }
        }

        if kstep == 1 {
            if do_swap {
                swap_symmetric(a, n, pivot_row, kk);
            }
            // Eliminate column kk from the leading (kk x kk) submatrix via
            // a rank-1 update, recording multipliers in place.
            let akk = a[at(n, kk, kk)];
            for j in 0..kk {
                let mulk = a[at(n, j, kk)] / akk;
                for i in 0..=j {
                    let aik = a[at(n, i, kk)];
                    a[at(n, i, j)] -= mulk * aik;
                }
                a[at(n, j, kk)] = mulk;
            }
            ipvt[kk] = if do_swap {
                -((pivot_row + 1) as i32)
            } else {
                (kk + 1) as i32
            };
        } else {
            let km1 = kk - 1;
            if do_swap {
                swap_symmetric(a, n, pivot_row, km1);
            }
            if kk >= 2 {
                let akm1k = a[at(n, km1, kk)];
                let akm1 = a[at(n, km1, km1)];
                let ak = a[at(n, kk, kk)];
                let denom = akm1 * ak - akm1k * akm1k;
                for j in 0..km1 {
                    let bk = a[at(n, j, kk)] / akm1k;
                    let bkm1 = a[at(n, j, km1)] / akm1k;
                    let mulk = (akm1 * bk - akm1k * bkm1) / denom;
                    let mulkm1 = (ak * bkm1 - akm1k * bk) / denom;
                    for i in 0..=j {
                        let aik = a[at(n, i, kk)];
                        let aikm1 = a[at(n, i, km1)];
                        a[at(n, i, j)] -= mulk * aik + mulkm1 * aikm1;
                    }
                    a[at(n, j, kk)] = mulk;
                    a[at(n, j, km1)] = mulkm1;
                }
            }
            ipvt[km1] = if do_swap {
                -((pivot_row + 1) as i32)
            } else {
                -(k as i32)
            };
            ipvt[kk] = ipvt[km1];
        }

        k -= kstep;
    }

    if let Some(index) = info {
        return Err(LasError::SingularMatrix { index });
    }
    Ok(ipvt)
}

fn swap_symmetric(a: &mut [f64], n: usize, p: usize, q: usize) {
    if p == q {
        return;
    }
    let (lo, hi) = if p < q { (p, q) } else { (q, p) };
    for j in 0..lo {
        dswap(a, at(n, lo, j), at(n, hi, j));
    }
    for j in (lo + 1)..hi {
        dswap(a, at(n, j, lo), at(n, hi, j));
    }
    dswap(a, at(n, lo, lo), at(n, hi, hi));
    for j in (hi + 1)..n {
        dswap(a, at(n, lo, j), at(n, hi, j));
    }
}

/// Solves `A x = b` given the factorization produced by [`dsifa`],
/// applying `D^-1 U^-T` to `b` in place (LINPACK `dsisl`).
pub fn dsisl(a: &[f64], n: usize, ipvt: &[i32], b: &mut [f64]) {
    let mut k = n;
    while k >= 1 {
        let kk = k - 1;
        if ipvt[kk] >= 0 {
            // 1x1 block.
            if kk > 0 {
                let piv = (ipvt[kk] as usize) - 1;
                if piv != kk {
                    dswap(b, piv, kk);
                }
                let col: Vec<f64> = (0..kk).map(|i| a[at(n, i, kk)]).collect();
                daxpy(b[kk], &col, &mut b[0..kk]);
            }
            b[kk] /= a[at(n, kk, kk)];
            k -= 1;
        } else {
            // 2x2 block spanning (kk-1, kk).
            let km1 = kk - 1;
            if km1 > 0 {
                let piv = (-ipvt[kk] as usize) - 1;
                if piv != km1 {
                    dswap(b, piv, km1);
                }
                let col_k: Vec<f64> = (0..km1).map(|i| a[at(n, i, kk)]).collect();
                let col_km1: Vec<f64> = (0..km1).map(|i| a[at(n, i, km1)]).collect();
                daxpy(b[kk], &col_k, &mut b[0..km1]);
                daxpy(b[km1], &col_km1, &mut b[0..km1]);
            }
            let akm1k = a[at(n, km1, kk)];
            let akm1 = a[at(n, km1, km1)];
            let ak = a[at(n, kk, kk)];
            let bkm1 = b[km1];
            let bk = b[kk];
            let denom = akm1 * ak - akm1k * akm1k;
            b[km1] = (akm1 * bk - akm1k * bkm1) / denom;
            b[kk] = (ak * bkm1 - akm1k * bk) / denom;
            k -= 2;
        }
    }
}

/// Cholesky factorization `A = L L^T` of a symmetric positive-definite
/// matrix, stored lower-triangular in place. Returns the relative
/// error obtained by comparing the reconstructed lower-right element of
/// `L L^T` against the original `A[n-1, n-1]`.
///
/// Fails with [`LasError::NotPositiveDefinite`] if a non-positive pivot is
/// reached before completion.
pub fn dchol2(a: &mut [f64], n: usize) -> LasResult<f64> {
    assert_eq!(a.len(), n * n);
    let original_corner = a[at(n, n - 1, n - 1)];

    for j in 0..n {
        let mut sum = a[at(n, j, j)];
        for k in 0..j {
            sum -= a[at(n, j, k)] * a[at(n, j, k)];
        }
        if sum <= 0.0 {
            return Err(LasError::NotPositiveDefinite { index: j });
        }
        let ljj = sum.sqrt();
        a[at(n, j, j)] = ljj;
        for i in (j + 1)..n {
            let mut s = a[at(n, i, j)];
            for k in 0..j {
                s -= a[at(n, i, k)] * a[at(n, j, k)];
            }
            a[at(n, i, j)] = s / ljj;
        }
    }

    let mut reconstructed = 0.0;
    for k in 0..n {
        reconstructed += a[at(n, n - 1, k)] * a[at(n, n - 1, k)];
    }
    let rerr = if original_corner.abs() > 0.0 {
        (reconstructed - original_corner).abs() / original_corner.abs()
    } else {
        (reconstructed - original_corner).abs()
    };
    Ok(rerr)
}

/// Packs the lower triangle of an `n x n` column-major matrix into the
/// column-major packed format used for the per-stage `C` tables (length
/// `n*(n+1)/2`).
pub fn pack_lower(a: &[f64], n: usize) -> Vec<f32> {
    let mut packed = Vec::with_capacity(n * (n + 1) / 2);
    for j in 0..n {
        for i in j..n {
            packed.push(a[at(n, i, j)] as f32);
        }
    }
    packed
}

/// Reconstructs a dense lower-triangular matrix (zero above the diagonal)
/// from the packed format produced by [`pack_lower`].
pub fn unpack_lower(packed: &[f32], n: usize) -> Vec<f64> {
    let mut a = vec![0.0; n * n];
    let mut idx = 0;
    for j in 0..n {
        for i in j..n {
            a[at(n, i, j)] = packed[idx] as f64;
            idx += 1;
        }
    }
    a
}
