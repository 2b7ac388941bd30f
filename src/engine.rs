// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! The LAS refinement driver: `las3i` initialization and `las3g` sampling,
//! wrapped in an opaque handle. `LasEngine` owns everything that would
//! otherwise live in process-wide globals — the PRNG stream, the
//! per-stage `(A, C)` tables, and the timing counters — so two engines
//! never share state and two samples from the same engine are
//! reproducible only by explicit reseed.

use std::time::{Duration, Instant};

use crate::config::{self, GridDecomposition, LasConfig};
use crate::covariance::{dcvit3, dcvmt3};
use crate::error::{LasError, LasResult};
use crate::field::{self, StageOffsets};
use crate::kernel::Kernel;
use crate::linalg::{dchol2, pack_lower, unpack_lower};
use crate::logsink::{self, LogSink};
use crate::masks::{self, Axis};
use crate::neighborhood::{self, NeighborhoodParams, StageParams2D, StageParams3D};
use crate::prng::Prng;

/// Per-stage conditioning tables: full 3-D classes for every stage except
/// possibly the first, which degenerates to the 2-D-in-3-D builders when
/// the grid collapses to a single coarse cell along one axis.
enum Stage {
    Full(StageParams3D),
    Planar { axis: Axis, params: StageParams2D },
}

/// Timing counters exposed to callers as plain fields on the handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub init_duration: Duration,
    pub last_sample_duration: Duration,
    pub total_sample_duration: Duration,
    pub sample_count: u64,
}

/// An initialized LAS engine: validated configuration, grid decomposition,
/// the stage-0 Cholesky factor, every stage's conditioning tables, the
/// PRNG stream, and running timing counters.
///
/// Destruction (`destroy(handle)`) is simply dropping the value — there
/// is no separate resource to release.
pub struct LasEngine<K: Kernel, L: LogSink> {
    config: LasConfig<K, L>,
    decomposition: GridDecomposition,
    c0: Vec<f32>,
    stages: Vec<Stage>,
    prng: Prng,
    stats: EngineStats,
}

fn resolve_seed(requested: i64) -> i64 {
    if requested > 0 {
        return requested;
    }
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(1);
    let pid = std::process::id() as i64;
    let folded = nanos ^ pid.wrapping_shl(32);
    (folded & i64::MAX).max(1)
}

/// Which single axis, if any, the grid collapses to one coarse cell along.
/// `Err` when more than one axis collapses at once — the 1-D LAS variant is
/// out of scope (see DESIGN.md).
fn collapsed_axis(gd: &GridDecomposition) -> LasResult<Option<Axis>> {
    if gd.m == 0 {
        // No refinement stage will ever run, so no neighborhood builder
        // ever sees this grid — a collapsed axis is irrelevant here
        // regardless of how many of k1/k2/k3 are 1.
        return Ok(None);
    }
    let ones = [gd.k1 == 1, gd.k2 == 1, gd.k3 == 1];
    match ones.iter().filter(|&&v| v).count() {
        0 => Ok(None),
        1 => Ok(Some(if ones[0] {
            Axis::X
        } else if ones[1] {
            Axis::Y
        } else {
            Axis::Z
        })),
        _ => Err(LasError::InvalidArgument(
            "grid decomposition collapses more than one axis to a single coarse cell; \
             the 1-D/2-D LAS variants are out of scope"
                .to_string(),
        )),
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum AxisState {
    Low,
    High,
    Interior,
}

fn axis_state(i: usize, n: usize) -> AxisState {
    if i == 1 {
        AxisState::Low
    } else if i == n {
        AxisState::High
    } else {
        AxisState::Interior
    }
}

/// Maps a boundary state to the mask builders' `*_high` flag: a cell at the
/// domain's low edge along an axis has no neighbor at `-1`, so it needs the
/// `{0, 1}` offset pair, which the builders call the "high" pair.
fn param_high(state: AxisState) -> bool {
    matches!(state, AxisState::Low)
}

fn axis_index(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Z => 2,
    }
}

fn axis_value(axis: Axis, i: usize, j: usize, k: usize) -> usize {
    match axis {
        Axis::X => i,
        Axis::Y => j,
        Axis::Z => k,
    }
}

fn axis_size(axis: Axis, nx: usize, ny: usize, nz: usize) -> usize {
    match axis {
        Axis::X => nx,
        Axis::Y => ny,
        Axis::Z => nz,
    }
}

/// Selects the conditioning table and gather mask for one parent cell at a
/// full 3-D stage, classifying its position along each axis as
/// corner/edge/side/interior.
fn classify_3d<'a>(
    stage: &'a StageParams3D,
    nx: usize,
    ny: usize,
    nz: usize,
    i: usize,
    j: usize,
    k: usize,
) -> (&'a NeighborhoodParams, Vec<usize>) {
    let sx = axis_state(i, nx);
    let sy = axis_state(j, ny);
    let sz = axis_state(k, nz);
    let boundary = [sx != AxisState::Interior, sy != AxisState::Interior, sz != AxisState::Interior];
    match boundary.iter().filter(|&&b| b).count() {
        3 => {
            let (xh, yh, zh) = (param_high(sx), param_high(sy), param_high(sz));
            let idx = (xh as usize) * 4 + (yh as usize) * 2 + (zh as usize);
            (&stage.corners[idx], masks::corner_mask(xh, yh, zh).to_vec())
        }
        2 => {
            let (free_axis, states) = if sx == AxisState::Interior {
                (Axis::X, (sy, sz))
            } else if sy == AxisState::Interior {
                (Axis::Y, (sx, sz))
            } else {
                (Axis::Z, (sx, sy))
            };
            let (ah, bh) = (param_high(states.0), param_high(states.1));
            let idx = axis_index(free_axis) * 4 + (ah as usize) * 2 + (bh as usize);
            (&stage.edges[idx], masks::edge_mask(free_axis, ah, bh).to_vec())
        }
        1 => {
            let (restricted_axis, state) = if sx != AxisState::Interior {
                (Axis::X, sx)
            } else if sy != AxisState::Interior {
                (Axis::Y, sy)
            } else {
                (Axis::Z, sz)
            };
            let high = param_high(state);
            let idx = axis_index(restricted_axis) * 2 + (high as usize);
            (&stage.sides[idx], masks::side_mask(restricted_axis, high).to_vec())
        }
        _ => (&stage.interior, masks::interior_mask().to_vec()),
    }
}

/// The degenerate first-stage classifier used when one axis is collapsed:
/// only the two free axes can be at a boundary.
fn classify_2d<'a>(
    stage: &'a StageParams2D,
    axis: Axis,
    nx: usize,
    ny: usize,
    nz: usize,
    i: usize,
    j: usize,
    k: usize,
) -> (&'a NeighborhoodParams, Vec<usize>) {
    let [axis_a, axis_b] = match axis {
        Axis::X => [Axis::Y, Axis::Z],
        Axis::Y => [Axis::X, Axis::Z],
        Axis::Z => [Axis::X, Axis::Y],
    };
    let sa = axis_state(axis_value(axis_a, i, j, k), axis_size(axis_a, nx, ny, nz));
    let sb = axis_state(axis_value(axis_b, i, j, k), axis_size(axis_b, nx, ny, nz));
    let boundary_a = sa != AxisState::Interior;
    let boundary_b = sb != AxisState::Interior;
    match (boundary_a, boundary_b) {
        (true, true) => {
            let (ah, bh) = (param_high(sa), param_high(sb));
            let idx = (ah as usize) * 2 + (bh as usize);
            (&stage.corners[idx], masks::corner2d_mask(axis, ah, bh).to_vec())
        }
        (true, false) | (false, true) => {
            let restricted_is_a = boundary_a;
            let high = if restricted_is_a { param_high(sa) } else { param_high(sb) };
            let idx = (restricted_is_a as usize) * 2 + (high as usize);
            (
                &stage.sides[idx],
                masks::side2d_mask(axis, restricted_is_a, high).to_vec(),
            )
        }
        (false, false) => (&stage.interior, masks::plane_mask(axis).to_vec()),
    }
}

impl<K: Kernel, L: LogSink> LasEngine<K, L> {
    /// `las3i`: validates `config`, decomposes the target grid into
    /// `(k1, k2, k3, m)`, seeds the PRNG, Cholesky-factors the stage-0
    /// covariance, and builds every stage's conditioning tables.
    ///
    /// Any fatal failure (incompatible grid, singular factorization, a
    /// non-positive-definite stage-0 covariance) is reported on `config`'s
    /// log sink before the error is returned.
    pub fn init(config: LasConfig<K, L>, seed: i64) -> LasResult<Self> {
        match Self::try_init(config, seed) {
            Ok(engine) => Ok(engine),
            Err((config, err)) => {
                logsink::error(&config.log, &err.to_string());
                Err(err)
            }
        }
    }

    /// Does the actual work of [`init`](Self::init); returns `config` back
    /// alongside any error so the caller can still reach its log sink.
    fn try_init(config: LasConfig<K, L>, seed: i64) -> Result<Self, (LasConfig<K, L>, LasError)> {
        let start = Instant::now();
        let decomposition = match config::validate_and_decompose(&config) {
            Ok(d) => d,
            Err(e) => return Err((config, e)),
        };
        let collapsed = match collapsed_axis(&decomposition) {
            Ok(c) => c,
            Err(e) => return Err((config, e)),
        };

        let mut prng = Prng::new();
        let used_seed = resolve_seed(seed);
        prng.randu(used_seed);

        let kk = decomposition.k1 * decomposition.k2 * decomposition.k3;
        let mut t = [
            config.xl / decomposition.k1 as f64,
            config.yl / decomposition.k2 as f64,
            config.zl / decomposition.k3 as f64,
        ];

        let (r0, mut r_prev) = dcvit3(
            &config.kernel,
            decomposition.k1,
            decomposition.k2,
            decomposition.k3,
            t[0],
            t[1],
            t[2],
        );
        let mut c0 = r0;
        let rerr = match dchol2(&mut c0, kk) {
            Ok(r) => r,
            Err(e) => return Err((config, e)),
        };
        if rerr > config.tol {
            logsink::warn(
                &config.log,
                &format!("stage-0 Cholesky relative error {rerr:.3e} exceeds tolerance {:.3e}", config.tol),
            );
        }
        let c0_packed = pack_lower(&c0, kk);

        let mut stages = Vec::with_capacity(decomposition.m as usize);
        for s in 0..decomposition.m {
            let lform_r = s + 1 < decomposition.m;
            let (b, s_mat, r_next) = dcvmt3(&config.kernel, t[0], t[1], t[2], lform_r);

            let stage = if s == 0 {
                if let Some(axis) = collapsed {
                    match neighborhood::build_stage_params_2d(axis, &r_prev, &b, &s_mat) {
                        Ok(params) => Stage::Planar { axis, params },
                        Err(e) => return Err((config, e)),
                    }
                } else {
                    match neighborhood::build_stage_params_3d(&r_prev, &b, &s_mat) {
                        Ok(params) => Stage::Full(params),
                        Err(e) => return Err((config, e)),
                    }
                }
            } else {
                match neighborhood::build_stage_params_3d(&r_prev, &b, &s_mat) {
                    Ok(params) => Stage::Full(params),
                    Err(e) => return Err((config, e)),
                }
            };
            stages.push(stage);

            t = [t[0] / 2.0, t[1] / 2.0, t[2] / 2.0];
            if let Some(rn) = r_next {
                r_prev = rn;
            }
        }

        let init_duration = start.elapsed();
        logsink::info(
            &config.log,
            &format!(
                "las3i: initialized in {init_duration:?} (k1={}, k2={}, k3={}, m={})",
                decomposition.k1, decomposition.k2, decomposition.k3, decomposition.m
            ),
        );

        Ok(LasEngine {
            config,
            decomposition,
            c0: c0_packed,
            stages,
            prng,
            stats: EngineStats {
                init_duration,
                ..Default::default()
            },
        })
    }

    /// `las3g`: draws a fresh stage-0 field and refines it through every
    /// precomputed stage, writing the final `N1*N2*N3` field into `z`.
    pub fn sample(&mut self, z: &mut [f64]) -> LasResult<()> {
        self.sample_inner(z, &mut |_, _| {})
    }

    /// Same as [`sample`](Self::sample), but invokes `on_stage(nx_ny_nz,
    /// values)` once per completed grid level (stage 0's coarse draw first,
    /// then one call per refinement) with that level's values in
    /// `cell_offset` order. Used by tests to check the upward-averaging
    /// invariant across levels that `sample` otherwise discards.
    fn sample_inner(
        &mut self,
        z: &mut [f64],
        on_stage: &mut dyn FnMut((usize, usize, usize), &[f64]),
    ) -> LasResult<()> {
        let start = Instant::now();
        let gd = self.decomposition;
        let target_len = self.config.n1 * self.config.n2 * self.config.n3;
        if z.len() != target_len {
            let err = LasError::InvalidArgument(format!(
                "output buffer has {} cells, expected {target_len}",
                z.len()
            ));
            logsink::error(&self.config.log, &err.to_string());
            return Err(err);
        }

        let buf_len = field::buffer_len(self.config.n1, self.config.n2, self.config.n3);
        let mut buf = vec![0.0f64; buf_len];
        let mut offs = StageOffsets::initial(self.config.n1, self.config.n2, self.config.n3, gd.m);

        let kk = gd.k1 * gd.k2 * gd.k3;
        let l0 = unpack_lower(&self.c0, kk);
        let mut u0 = vec![0.0; kk];
        if let Err(e) = self.prng.vnorm(&mut u0) {
            logsink::error(&self.config.log, &e.to_string());
            return Err(e);
        }
        for i in 0..kk {
            let mut acc = 0.0;
            for j in 0..=i {
                acc += l0[i + j * kk] * u0[j];
            }
            buf[offs.parent_offset() + i] = acc;
        }

        let mut nx = gd.k1;
        let mut ny = gd.k2;
        let mut nz = gd.k3;
        on_stage((nx, ny, nz), &buf[offs.parent_offset()..offs.parent_offset() + nx * ny * nz]);
        let mut u7 = [0.0f64; 7];

        for stage in &self.stages {
            let (cx, cy, cz) = (2 * nx, 2 * ny, 2 * nz);
            for k in 1..=nz {
                for j in 1..=ny {
                    for i in 1..=nx {
                        let parent_idx = field::cell_offset(nx, ny, i, j, k);
                        let parent_val = buf[offs.parent_offset() + parent_idx];

                        let (params, mask) = match stage {
                            Stage::Full(s3) => classify_3d(s3, nx, ny, nz, i, j, k),
                            Stage::Planar { axis, params } => {
                                classify_2d(params, *axis, nx, ny, nz, i, j, k)
                            }
                        };

                        let parents: Vec<f64> = mask
                            .iter()
                            .map(|&idx| {
                                let (dx, dy, dz) = masks::nbr_offset(idx);
                                let pi = (i as i32 + dx) as usize;
                                let pj = (j as i32 + dy) as usize;
                                let pk = (k as i32 + dz) as usize;
                                buf[offs.parent_offset() + field::cell_offset(nx, ny, pi, pj, pk)]
                            })
                            .collect();

                        if let Err(e) = self.prng.vnorm(&mut u7) {
                            logsink::error(&self.config.log, &e.to_string());
                            return Err(e);
                        }
                        let c_dense = unpack_lower(&params.c, 7);

                        let mut children = [0.0f64; 7];
                        let mut sum_seven = 0.0;
                        for c in 0..7 {
                            let mut reg = 0.0;
                            for (m_idx, &pv) in parents.iter().enumerate() {
                                reg += params.a[m_idx + c * params.mask_len] as f64 * pv;
                            }
                            let mut noise = 0.0;
                            for kk_ in 0..=c {
                                noise += c_dense[c + kk_ * 7] * u7[kk_];
                            }
                            children[c] = reg + noise;
                            sum_seven += children[c];
                        }
                        let child8 = 8.0 * parent_val - sum_seven;

                        for c in 0..8 {
                            let dx = c % 2;
                            let dy = (c / 2) % 2;
                            let dz = c / 4;
                            let ci = 2 * (i - 1) + 1 + dx;
                            let cj = 2 * (j - 1) + 1 + dy;
                            let ck = 2 * (k - 1) + 1 + dz;
                            let value = if c < 7 { children[c] } else { child8 };
                            let offset = offs.child_offset() + field::cell_offset(cx, cy, ci, cj, ck);
                            buf[offset] = value;
                        }
                    }
                }
            }
            nx = cx;
            ny = cy;
            nz = cz;
            offs.advance();
            on_stage((nx, ny, nz), &buf[offs.parent_offset()..offs.parent_offset() + nx * ny * nz]);
        }

        z.copy_from_slice(&buf[offs.parent_offset()..offs.parent_offset() + target_len]);

        let elapsed = start.elapsed();
        self.stats.last_sample_duration = elapsed;
        self.stats.total_sample_duration += elapsed;
        self.stats.sample_count += 1;
        logsink::info(
            &self.config.log,
            &format!(
                "las3g: sampled {}x{}x{} field in {elapsed:?}",
                self.config.n1, self.config.n2, self.config.n3
            ),
        );
        Ok(())
    }

    /// Re-seeds the PRNG stream, returning the seed actually used: `s`
    /// itself when positive, otherwise a clock-derived value (wall-clock
    /// nanoseconds XORed with the process id, see DESIGN.md).
    pub fn seed(&mut self, s: i64) -> i64 {
        let used = resolve_seed(s);
        self.prng.randu(used);
        used
    }

    pub fn decomposition(&self) -> GridDecomposition {
        self.decomposition
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }
}
