// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Neighborhood parameter builders: turns a stage's covariance template
//! `R`, child covariance `B` and parent-child cross-covariance `S` into
//! the per-class `A`/`C` conditioning tables the sampling driver applies
//! at each grid cell.
//!
//! All eight builder classes (corner/edge/side/interior and their
//! 2-D-in-3-D counterparts) share one procedure, parametrized only by the
//! neighborhood mask: restrict `R` to the mask, factor it, solve for the
//! first seven children's regression coefficients, then Cholesky-factor the
//! residual 7x7 covariance of those seven children given the neighborhood.
//! The eighth child is never regressed — it is reconstructed at sampling
//! time by upward averaging — so every table here carries exactly 7
//! columns.

use crate::error::LasResult;
use crate::linalg::{dchol2, dsifa, dsisl, pack_lower};
use crate::masks::{self, Axis};

/// The conditioning tables produced by one neighborhood builder: `a` is the
/// mask-length-by-7 regression matrix (column-major, single precision) and
/// `c` is the packed lower triangle of the 7x7 Cholesky factor of the
/// residual covariance (28 entries).
#[derive(Debug, Clone)]
pub struct NeighborhoodParams {
    pub a: Vec<f32>,
    pub c: Vec<f32>,
    pub mask_len: usize,
}

/// Runs the shared five-step builder procedure for one neighborhood mask:
/// restrict `R` to `mask`, factor it, solve for 7 children's regression
/// coefficients against `S`, and Cholesky-factor the 7x7 residual against
/// `B`.
fn build_params<const N: usize>(
    mask: &[usize; N],
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<NeighborhoodParams> {
    let mut rr = vec![0.0; N * N];
    for (jj, &mj) in mask.iter().enumerate() {
        for (ii, &mi) in mask.iter().enumerate() {
            rr[ii + jj * N] = r[mi][mj];
        }
    }
    let ipvt = dsifa(&mut rr, N)?;

    let mut a = vec![0.0f64; N * 7];
    for child in 0..7 {
        let mut rhs: Vec<f64> = mask.iter().map(|&mi| s[mi][child]).collect();
        dsisl(&rr, N, &ipvt, &mut rhs);
        for (i, v) in rhs.into_iter().enumerate() {
            a[i + child * N] = v;
        }
    }

    let mut bb = vec![0.0; 7 * 7];
    for i in 0..7 {
        for j in 0..7 {
            let mut sum = 0.0;
            for (k, &mk) in mask.iter().enumerate() {
                sum += s[mk][i] * a[k + j * N];
            }
            bb[i + j * 7] = b[i][j] - sum;
        }
    }
    let _rerr = dchol2(&mut bb, 7)?;

    Ok(NeighborhoodParams {
        a: a.iter().map(|&v| v as f32).collect(),
        c: pack_lower(&bb, 7),
        mask_len: N,
    })
}

/// The 3-D builder for the `(x_high, y_high, z_high)` corner class.
pub fn corner_params(
    x_high: bool,
    y_high: bool,
    z_high: bool,
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<NeighborhoodParams> {
    build_params(&masks::corner_mask(x_high, y_high, z_high), r, b, s)
}

/// The 3-D builder for the edge class with `free_axis` unrestricted.
pub fn edge_params(
    free_axis: Axis,
    a_high: bool,
    b_high: bool,
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<NeighborhoodParams> {
    build_params(&masks::edge_mask(free_axis, a_high, b_high), r, b, s)
}

/// The 3-D builder for the side class restricted along `restricted_axis`.
pub fn side_params(
    restricted_axis: Axis,
    high: bool,
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<NeighborhoodParams> {
    build_params(&masks::side_mask(restricted_axis, high), r, b, s)
}

/// The single interior builder, using the full 27-cell neighborhood.
pub fn interior_params(
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<NeighborhoodParams> {
    build_params(&masks::interior_mask(), r, b, s)
}

/// The 2-D-in-3-D corner builder (`corn2d`), used on the first refinement
/// when `collapsed_axis`'s grid count is 1.
pub fn corner2d_params(
    collapsed_axis: Axis,
    a_high: bool,
    b_high: bool,
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<NeighborhoodParams> {
    build_params(&masks::corner2d_mask(collapsed_axis, a_high, b_high), r, b, s)
}

/// The 2-D-in-3-D side builder (`side2d`).
pub fn side2d_params(
    collapsed_axis: Axis,
    restricted_is_a: bool,
    high: bool,
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<NeighborhoodParams> {
    build_params(
        &masks::side2d_mask(collapsed_axis, restricted_is_a, high),
        r,
        b,
        s,
    )
}

/// The 2-D-in-3-D interior builder (`intr2d`), using the full 9-cell plane.
pub fn intr2d_params(
    collapsed_axis: Axis,
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<NeighborhoodParams> {
    build_params(&masks::plane_mask(collapsed_axis), r, b, s)
}

/// One stage's full set of 3-D conditioning tables: 8 corner, 12 edge, 6
/// side and 1 interior builder, in the enumeration order of
/// [`masks::all_corner_masks`]/[`masks::all_edge_masks`]/
/// [`masks::all_side_masks`].
pub struct StageParams3D {
    pub corners: Vec<NeighborhoodParams>,
    pub edges: Vec<NeighborhoodParams>,
    pub sides: Vec<NeighborhoodParams>,
    pub interior: NeighborhoodParams,
}

pub fn build_stage_params_3d(
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<StageParams3D> {
    let mut corners = Vec::with_capacity(8);
    for &x in &[false, true] {
        for &y in &[false, true] {
            for &z in &[false, true] {
                corners.push(corner_params(x, y, z, r, b, s)?);
            }
        }
    }

    let mut edges = Vec::with_capacity(12);
    for axis in Axis::ALL {
        for &a in &[false, true] {
            for &bh in &[false, true] {
                edges.push(edge_params(axis, a, bh, r, b, s)?);
            }
        }
    }

    let mut sides = Vec::with_capacity(6);
    for axis in Axis::ALL {
        for &high in &[false, true] {
            sides.push(side_params(axis, high, r, b, s)?);
        }
    }

    let interior = interior_params(r, b, s)?;

    Ok(StageParams3D {
        corners,
        edges,
        sides,
        interior,
    })
}

/// The degenerate first-refinement tables when `collapsed_axis`'s grid
/// count is 1: 4 planar-corner, 2 planar-side (one per direction along the
/// remaining free axis) and 1 planar-interior builder.
pub struct StageParams2D {
    pub corners: Vec<NeighborhoodParams>,
    pub sides: Vec<NeighborhoodParams>,
    pub interior: NeighborhoodParams,
}

pub fn build_stage_params_2d(
    collapsed_axis: Axis,
    r: &[[f64; 27]; 27],
    b: &[[f64; 8]; 8],
    s: &[[f64; 8]; 27],
) -> LasResult<StageParams2D> {
    let mut corners = Vec::with_capacity(4);
    for &a in &[false, true] {
        for &bh in &[false, true] {
            corners.push(corner2d_params(collapsed_axis, a, bh, r, b, s)?);
        }
    }

    let mut sides = Vec::with_capacity(4);
    for &restricted_is_a in &[false, true] {
        for &high in &[false, true] {
            sides.push(side2d_params(collapsed_axis, restricted_is_a, high, r, b, s)?);
        }
    }

    let interior = intr2d_params(collapsed_axis, r, b, s)?;

    Ok(StageParams2D {
        corners,
        sides,
        interior,
    })
}
