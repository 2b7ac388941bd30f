// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Constant neighborhood index masks.
//!
//! The 3x3x3 parent neighborhood around a child octet is flattened to a
//! single 27-entry index space, `(dx, dy, dz)` each ranging over
//! `{-1, 0, 1}` with `dx` fastest:
//!
//! ```text
//! index(dx, dy, dz) = (dx + 1) + 3*(dy + 1) + 9*(dz + 1)
//! ```
//!
//! so index 13 is always the parent cell the child octet sits inside.
//! Corner/edge/side/interior masks select which of these 27 positions are
//! available parents given where the octet sits relative to the domain
//! boundary; they are computed here from the octant/axis description
//! rather than hand-transcribed as literal tables, which is both less
//! error-prone and mirrors how a reimplementation should express what the
//! original's per-class constant arrays encode structurally.

/// One of the three grid axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    fn others(self) -> [Axis; 2] {
        match self {
            Axis::X => [Axis::Y, Axis::Z],
            Axis::Y => [Axis::X, Axis::Z],
            Axis::Z => [Axis::X, Axis::Y],
        }
    }
}

/// Flattens a `(dx, dy, dz)` offset (each in `-1..=1`) to its position in
/// the 27-entry neighborhood.
pub fn nbr_index(dx: i32, dy: i32, dz: i32) -> usize {
    debug_assert!((-1..=1).contains(&dx) && (-1..=1).contains(&dy) && (-1..=1).contains(&dz));
    ((dx + 1) + 3 * (dy + 1) + 9 * (dz + 1)) as usize
}

fn index_of(axis_x: i32, axis_y: i32, axis_z: i32) -> usize {
    nbr_index(axis_x, axis_y, axis_z)
}

/// Inverse of [`nbr_index`]: recovers the `(dx, dy, dz)` offset a flattened
/// neighborhood position stands for.
pub fn nbr_offset(index: usize) -> (i32, i32, i32) {
    debug_assert!(index < 27);
    let dx = (index % 3) as i32 - 1;
    let dy = ((index / 3) % 3) as i32 - 1;
    let dz = (index / 9) as i32 - 1;
    (dx, dy, dz)
}

/// All 27 positions. The single interior-neighborhood variant.
pub fn interior_mask() -> [usize; 27] {
    let mut mask = [0usize; 27];
    let mut n = 0;
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                mask[n] = index_of(dx, dy, dz);
                n += 1;
            }
        }
    }
    mask
}

/// One octant (8 of 27 cells): each axis restricted to the pair of
/// offsets adjacent to `0` on the side named by `*_high`. Eight such
/// masks exist (2^3 combinations of axis direction), matching the eight
/// corner neighborhood classes.
pub fn corner_mask(x_high: bool, y_high: bool, z_high: bool) -> [usize; 8] {
    let pair = |high: bool| if high { [0, 1] } else { [-1, 0] };
    let xs = pair(x_high);
    let ys = pair(y_high);
    let zs = pair(z_high);
    let mut mask = [0usize; 8];
    let mut n = 0;
    for &dz in &zs {
        for &dy in &ys {
            for &dx in &xs {
                mask[n] = index_of(dx, dy, dz);
                n += 1;
            }
        }
    }
    mask
}

/// One axis left free (all three offsets), the other two restricted to an
/// octant pair (12 of 27 cells). Twelve such masks exist: one choice of
/// free axis (3) times one choice of octant in the remaining two axes
/// (2x2 = 4), matching the twelve edge neighborhood classes.
pub fn edge_mask(free_axis: Axis, a_high: bool, b_high: bool) -> [usize; 12] {
    let [axis_a, axis_b] = free_axis.others();
    let pair = |high: bool| if high { [0, 1] } else { [-1, 0] };
    let a_vals = pair(a_high);
    let b_vals = pair(b_high);
    let mut mask = [0usize; 12];
    let mut n = 0;
    for free in -1..=1 {
        for &bv in &b_vals {
            for &av in &a_vals {
                let mut dx = 0;
                let mut dy = 0;
                let mut dz = 0;
                set_axis(&mut dx, &mut dy, &mut dz, free_axis, free);
                set_axis(&mut dx, &mut dy, &mut dz, axis_a, av);
                set_axis(&mut dx, &mut dy, &mut dz, axis_b, bv);
                mask[n] = index_of(dx, dy, dz);
                n += 1;
            }
        }
    }
    mask
}

/// One axis restricted to an octant pair, the other two left free
/// (18 of 27 cells). Six such masks exist: one choice of restricted axis
/// (3) times one direction (2), matching the six side neighborhood
/// classes.
pub fn side_mask(restricted_axis: Axis, high: bool) -> [usize; 18] {
    let pair = if high { [0, 1] } else { [-1, 0] };
    let [axis_a, axis_b] = restricted_axis.others();
    let mut mask = [0usize; 18];
    let mut n = 0;
    for b in -1..=1 {
        for a in -1..=1 {
            for &r in &pair {
                let mut dx = 0;
                let mut dy = 0;
                let mut dz = 0;
                set_axis(&mut dx, &mut dy, &mut dz, restricted_axis, r);
                set_axis(&mut dx, &mut dy, &mut dz, axis_a, a);
                set_axis(&mut dx, &mut dy, &mut dz, axis_b, b);
                mask[n] = index_of(dx, dy, dz);
                n += 1;
            }
        }
    }
    mask
}

fn set_axis(dx: &mut i32, dy: &mut i32, dz: &mut i32, axis: Axis, v: i32) {
    match axis {
        Axis::X => *dx = v,
        Axis::Y => *dy = v,
        Axis::Z => *dz = v,
    }
}

/// The 9 cells of the planar neighborhood obtained by collapsing
/// `collapsed_axis` to offset 0 — the reduced neighborhood used by the
/// 2-D-in-3-D builders on the first refinement when the corresponding
/// `k_i == 1`.
pub fn plane_mask(collapsed_axis: Axis) -> [usize; 9] {
    let [axis_a, axis_b] = collapsed_axis.others();
    let mut mask = [0usize; 9];
    let mut n = 0;
    for b in -1..=1 {
        for a in -1..=1 {
            let mut dx = 0;
            let mut dy = 0;
            let mut dz = 0;
            set_axis(&mut dx, &mut dy, &mut dz, axis_a, a);
            set_axis(&mut dx, &mut dy, &mut dz, axis_b, b);
            mask[n] = index_of(dx, dy, dz);
            n += 1;
        }
    }
    mask
}

/// 4 of the 9 planar cells: an octant in each of the two free axes.
/// Four variants exist (one per planar corner).
pub fn corner2d_mask(collapsed_axis: Axis, a_high: bool, b_high: bool) -> [usize; 4] {
    let [axis_a, axis_b] = collapsed_axis.others();
    let pair = |high: bool| if high { [0, 1] } else { [-1, 0] };
    let a_vals = pair(a_high);
    let b_vals = pair(b_high);
    let mut mask = [0usize; 4];
    let mut n = 0;
    for &bv in &b_vals {
        for &av in &a_vals {
            let mut dx = 0;
            let mut dy = 0;
            let mut dz = 0;
            set_axis(&mut dx, &mut dy, &mut dz, axis_a, av);
            set_axis(&mut dx, &mut dy, &mut dz, axis_b, bv);
            mask[n] = index_of(dx, dy, dz);
            n += 1;
        }
    }
    mask
}

/// 6 of the 9 planar cells: one free axis restricted to an octant pair,
/// the other left fully free. Four variants exist (one per planar side).
pub fn side2d_mask(collapsed_axis: Axis, restricted_is_a: bool, high: bool) -> [usize; 6] {
    let [axis_a, axis_b] = collapsed_axis.others();
    let (restricted_axis, free_axis) = if restricted_is_a {
        (axis_a, axis_b)
    } else {
        (axis_b, axis_a)
    };
    let pair = if high { [0, 1] } else { [-1, 0] };
    let mut mask = [0usize; 6];
    let mut n = 0;
    for f in -1..=1 {
        for &r in &pair {
            let mut dx = 0;
            let mut dy = 0;
            let mut dz = 0;
            set_axis(&mut dx, &mut dy, &mut dz, restricted_axis, r);
            set_axis(&mut dx, &mut dy, &mut dz, free_axis, f);
            mask[n] = index_of(dx, dy, dz);
            n += 1;
        }
    }
    mask
}

/// All eight corner masks, in a fixed enumeration order used to index the
/// per-stage corner parameter table.
pub fn all_corner_masks() -> [[usize; 8]; 8] {
    let mut out = [[0usize; 8]; 8];
    let mut n = 0;
    for &x in &[false, true] {
        for &y in &[false, true] {
            for &z in &[false, true] {
                out[n] = corner_mask(x, y, z);
                n += 1;
            }
        }
    }
    out
}

/// All twelve edge masks, in a fixed enumeration order.
pub fn all_edge_masks() -> [[usize; 12]; 12] {
    let mut out = [[0usize; 12]; 12];
    let mut n = 0;
    for axis in Axis::ALL {
        for &a in &[false, true] {
            for &b in &[false, true] {
                out[n] = edge_mask(axis, a, b);
                n += 1;
            }
        }
    }
    out
}

/// All six side masks, in a fixed enumeration order.
pub fn all_side_masks() -> [[usize; 18]; 6] {
    let mut out = [[0usize; 18]; 6];
    let mut n = 0;
    for axis in Axis::ALL {
        for &high in &[false, true] {
            out[n] = side_mask(axis, high);
            n += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nbr_offset_inverts_nbr_index() {
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    assert_eq!(nbr_offset(nbr_index(dx, dy, dz)), (dx, dy, dz));
                }
            }
        }
    }

    #[test]
    fn interior_mask_covers_all_27_cells_uniquely() {
        let mut mask = interior_mask();
        mask.sort_unstable();
        assert_eq!(mask, core::array::from_fn::<usize, 27, _>(|i| i));
    }

    #[test]
    fn corner_masks_are_disjoint_octants() {
        let masks = all_corner_masks();
        let mut seen = vec![0usize; 27];
        for m in masks.iter() {
            assert_eq!(m.len(), 8);
            for &idx in m.iter() {
                seen[idx] += 1;
            }
        }
        // Every non-center cell of the neighborhood sits in exactly one
        // octant; the center (index 13) sits in all eight.
        for (idx, count) in seen.iter().enumerate() {
            if idx == 13 {
                assert_eq!(*count, 8);
            } else {
                assert_eq!(*count, 1, "index {idx} covered {count} times");
            }
        }
    }

    #[test]
    fn edge_masks_have_expected_size_and_center() {
        for m in all_edge_masks() {
            assert_eq!(m.len(), 12);
            assert!(m.contains(&13));
        }
    }

    #[test]
    fn side_masks_have_expected_size_and_center() {
        for m in all_side_masks() {
            assert_eq!(m.len(), 18);
            assert!(m.contains(&13));
        }
    }

    #[test]
    fn plane_mask_collapses_to_nine_cells() {
        let m = plane_mask(Axis::Z);
        let mut sorted = m;
        sorted.sort_unstable();
        let expected: Vec<usize> = (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| nbr_index(dx, dy, 0)))
            .collect();
        let mut expected_sorted = expected.clone();
        expected_sorted.sort_unstable();
        assert_eq!(sorted.to_vec(), expected_sorted);
    }

    #[test]
    fn corner2d_and_side2d_stay_within_plane() {
        let plane = plane_mask(Axis::Y);
        for &a in &[false, true] {
            for &b in &[false, true] {
                let m = corner2d_mask(Axis::Y, a, b);
                assert_eq!(m.len(), 4);
                assert!(m.iter().all(|idx| plane.contains(idx)));
            }
        }
        for &restricted_is_a in &[false, true] {
            for &high in &[false, true] {
                let m = side2d_mask(Axis::Y, restricted_is_a, high);
                assert_eq!(m.len(), 6);
                assert!(m.iter().all(|idx| plane.contains(idx)));
            }
        }
    }
}
