// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! The field buffer: a single dense array that two consecutive
//! subdivision stages ping-pong through, and the x-fastest index
//! convention the rest of the engine assumes. Callers never see raw
//! pointer math across the shared buffer, only named stage offsets and
//! index conversions.

/// Buffer size, in cells, needed to hold two ping-ponging stages of an
/// `n1 x n2 x n3` target grid (`ceil(9/8 * n1*n2*n3)`).
pub fn buffer_len(n1: usize, n2: usize, n3: usize) -> usize {
    let cells = n1 * n2 * n3;
    (9 * cells).div_ceil(8)
}

/// Converts a 1-based `(i, j, k)` cell position within an `nx x ny x nz`
/// grid to its offset inside a stage, x fastest.
pub fn cell_offset(nx: usize, ny: usize, i: usize, j: usize, k: usize) -> usize {
    (i - 1) + nx * (j - 1) + nx * ny * (k - 1)
}

/// The two stage offsets used while sweeping subdivision stages: `parent`
/// (where the previous stage's values live, read-only this stage) and
/// `child` (where this stage's values are being written). Calling
/// [`advance`](Self::advance) after a stage completes promotes the just-
/// written data to `parent` for the next stage.
///
/// Both offsets are drawn from the fixed pair `{0, cells}` where `cells =
/// n1*n2*n3` is the *final* stage's size, not `buffer_len - cells`: the two
/// regions these offsets head are `[0, cells)` (size `cells`) and `[cells,
/// buffer_len)` (size `buffer_len - cells`, the `N/8` tail). Every stage
/// short of the final one has size `kk * 8^s <= kk * 8^(m-1) = cells / 8`,
/// so it fits the tail region whichever offset it lands on; the final
/// stage (size `cells`) only ever fits the `0` region, and the parity
/// invariant below always places it there. Picking `buffer_len - cells`
/// instead of `cells` as the second offset would put that tail region
/// *inside* `[0, cells)` — the very overlap this layout exists to avoid.
#[derive(Debug, Clone, Copy)]
pub struct StageOffsets {
    parent: usize,
    child: usize,
}

impl StageOffsets {
    /// Offsets for stage 0 of an `m`-stage refinement: stage 0 is written
    /// at the offset that will end up holding stage `m` after `m`
    /// alternations, i.e. offset `0` when `m` is even and `cells`
    /// otherwise.
    pub fn initial(n1: usize, n2: usize, n3: usize, m: u32) -> StageOffsets {
        let cells = n1 * n2 * n3;
        if m % 2 == 0 {
            StageOffsets { parent: 0, child: cells }
        } else {
            StageOffsets { parent: cells, child: 0 }
        }
    }

    pub fn parent_offset(&self) -> usize {
        self.parent
    }

    pub fn child_offset(&self) -> usize {
        self.child
    }

    /// Promotes the just-written child stage to parent for the next
    /// stage.
    pub fn advance(&mut self) {
        std::mem::swap(&mut self.parent, &mut self.child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_len_rounds_up() {
        assert_eq!(buffer_len(2, 2, 2), (9 * 8_usize).div_ceil(8));
        assert_eq!(buffer_len(1, 1, 1), 2);
    }

    #[test]
    fn cell_offset_is_x_fastest() {
        assert_eq!(cell_offset(4, 4, 1, 1, 1), 0);
        assert_eq!(cell_offset(4, 4, 2, 1, 1), 1);
        assert_eq!(cell_offset(4, 4, 1, 2, 1), 4);
        assert_eq!(cell_offset(4, 4, 1, 1, 2), 16);
    }

    #[test]
    fn final_stage_lands_at_zero() {
        // m stages means the data starting at `initial().parent_offset()`
        // moves to the other offset and back m times; after an even m it
        // ends back where it started, after an odd m it ends at the other
        // offset. Either way the result should land at 0.
        let mut offs_even = StageOffsets::initial(4, 4, 4, 2);
        for _ in 0..2 {
            offs_even.advance();
        }
        assert_eq!(offs_even.parent_offset(), 0);

        let mut offs_odd = StageOffsets::initial(4, 4, 4, 3);
        for _ in 0..3 {
            offs_odd.advance();
        }
        assert_eq!(offs_odd.parent_offset(), 0);
    }

    #[test]
    fn offset_regions_never_overlap() {
        // `[0, cells)` and `[cells, buffer_len)` are disjoint by
        // construction, and the tail region is large enough to hold every
        // non-final stage (at most `cells / 8`), so a parent stage sitting
        // there is never clobbered by a child write into `[0, cells)`.
        let (n1, n2, n3) = (16, 16, 16);
        let cells = n1 * n2 * n3;
        let tail = buffer_len(n1, n2, n3) - cells;
        assert!(tail >= cells / 8, "tail region too small: {tail} < {}", cells / 8);

        // (16, 16, 16) decomposes to k=(8,8,8), m=1: stage 0 (512 cells)
        // is the parent throughout the single refinement, and must land
        // in the tail region, disjoint from the final stage's `[0, cells)`.
        let offs = StageOffsets::initial(n1, n2, n3, 1);
        assert_eq!(offs.parent_offset(), cells);
        assert_eq!(offs.child_offset(), 0);
        assert!(offs.parent_offset() + 512 <= buffer_len(n1, n2, n3));
    }
}
