//! Black-box, whole-engine checks: the grid decomposition matrix, PRNG
//! determinism and distribution, Gaussian marginals, and empirical
//! covariance reproduction against the analytical kernel. These exercise
//! [`las3d::LasEngine`] only through its public API, the way a caller
//! embedding the crate would.

use las3d::{FnKernel, LasConfig, LasEngine, LasError, NullSink, Prng};
use rand::{rngs::StdRng, Rng, SeedableRng};
use statrs::function::gamma::checked_gamma_ur;

fn exponential_kernel(theta: f64) -> FnKernel<impl Fn(f64, f64, f64) -> f64, impl Fn(f64, f64, f64) -> f64> {
    FnKernel::new(
        move |x: f64, y: f64, z: f64| (-2.0 * (x * x + y * y + z * z).sqrt() / theta).exp(),
        move |v1: f64, v2: f64, v3: f64| 1.0 / (1.0 + (v1 + v2 + v3) / theta),
    )
}

/// Grid decomposition matrix: a handful of grids that should decompose
/// cleanly, plus the canonical incompatible case.
#[test]
fn grid_decomposition_matrix() {
    struct Case {
        dims: (usize, usize, usize),
        expect_ok: bool,
    }
    let cases = [
        Case { dims: (8, 8, 8), expect_ok: true },
        Case { dims: (1, 1, 1), expect_ok: true },
        Case { dims: (16, 16, 16), expect_ok: true },
        Case { dims: (4, 4, 1), expect_ok: true },
        Case { dims: (512, 1, 1), expect_ok: true },
        Case { dims: (144, 256, 256), expect_ok: false },
    ];

    for case in cases {
        let (n1, n2, n3) = case.dims;
        let config = LasConfig::new(n1, n2, n3, 1.0, 1.0, 1.0, exponential_kernel(2.0), NullSink);
        let result = LasEngine::init(config, 1);
        assert_eq!(
            result.is_ok(),
            case.expect_ok,
            "grid {:?} expected ok={}, got {:?}",
            case.dims,
            case.expect_ok,
            result.err()
        );
        if !case.expect_ok {
            assert!(matches!(result.unwrap_err(), LasError::IncompatibleGrid { .. }));
        }
    }
}

/// Two freshly initialized engines with the same configuration and seed
/// must produce bit-identical fields.
#[test]
fn identical_seeds_reproduce_the_same_field() {
    let mut seeder = StdRng::seed_from_u64(20260728);
    for _ in 0..5 {
        let seed = seeder.random_range(1..1_000_000);
        let cfg_a = LasConfig::new(16, 16, 16, 2.0, 2.0, 2.0, exponential_kernel(3.0), NullSink);
        let mut engine_a = LasEngine::init(cfg_a, seed).unwrap();
        let mut za = vec![0.0; 16 * 16 * 16];
        engine_a.sample(&mut za).unwrap();

        let cfg_b = LasConfig::new(16, 16, 16, 2.0, 2.0, 2.0, exponential_kernel(3.0), NullSink);
        let mut engine_b = LasEngine::init(cfg_b, seed).unwrap();
        let mut zb = vec![0.0; 16 * 16 * 16];
        engine_b.sample(&mut zb).unwrap();

        assert_eq!(za, zb, "seed {seed} diverged between two engines");
    }
}

/// The underlying uniform generator's first and second moments must match
/// the U(0,1) expectation over a large sample.
#[test]
fn uniform_stream_has_the_expected_mean_and_variance() {
    let mut rng = Prng::new();
    rng.randu(20260728);
    let n = 1_000_000usize;
    let mut sum = 0.0;
    let mut sumsq = 0.0;
    for _ in 0..n {
        let v = rng.randu(0);
        sum += v;
        sumsq += v * v;
    }
    let mean = sum / n as f64;
    let var = sumsq / n as f64 - mean * mean;
    assert!((mean - 0.5).abs() < 0.005, "mean = {mean}");
    assert!((var - 1.0 / 12.0).abs() < 0.002, "var = {var}");
}

/// A chi-square goodness-of-fit test of the Gaussian variate generator
/// against a standard normal, binned into 16 equal-probability cells.
#[test]
fn gaussian_variates_pass_a_chi_square_goodness_of_fit_test() {
    let bins = 16usize;
    let n = 1 << 18;
    let mut counts = vec![0u64; bins];

    let mut rng = Prng::new();
    rng.randu(13);
    let mut buf = [0.0f64; 2];
    let mut produced = 0usize;
    while produced < n {
        rng.vnorm(&mut buf).unwrap();
        for &v in &buf {
            if produced >= n {
                break;
            }
            let bin = standard_normal_bin(v, bins);
            counts[bin] += 1;
            produced += 1;
        }
    }

    let expected = n as f64 / bins as f64;
    let chi_sq: f64 = counts
        .iter()
        .map(|&c| {
            let diff = c as f64 - expected;
            diff * diff / expected
        })
        .sum();

    let dof = (bins - 1) as f64;
    let p_value = checked_gamma_ur(dof / 2.0, chi_sq / 2.0).unwrap_or(0.0);
    assert!(
        p_value > 0.001,
        "chi-square statistic {chi_sq} (p = {p_value}) rejects normality at bins={bins}, n={n}"
    );
}

/// Maps a standard normal variate to one of `bins` equal-probability
/// buckets via the inverse CDF breakpoints of a standard normal, computed
/// once per call for clarity over raw speed (test code only).
fn standard_normal_bin(v: f64, bins: usize) -> usize {
    // Equal-probability breakpoints for a N(0,1) split into `bins` cells,
    // expressed via the same chi-square-friendly symmetric quantile ladder
    // used by classic normality tests: z_k = Phi^-1(k / bins).
    let quantile = |p: f64| -> f64 {
        // Acklam's rational approximation to the standard normal inverse
        // CDF, accurate to about 1.15e-9 - plenty for binning purposes.
        let a = [
            -3.969683028665376e+01,
            2.209460984245205e+02,
            -2.759285104469687e+02,
            1.383577518672690e+02,
            -3.066479806614716e+01,
            2.506628277459239e+00,
        ];
        let b = [
            -5.447609879822406e+01,
            1.615858368580409e+02,
            -1.556989798598866e+02,
            6.680131188771972e+01,
            -1.328068155288572e+01,
        ];
        let c = [
            -7.784894002430293e-03,
            -3.223964580411365e-01,
            -2.400758277161838e+00,
            -2.549732539343734e+00,
            4.374664141464968e+00,
            2.938163982698783e+00,
        ];
        let d = [
            7.784695709041462e-03,
            3.224671290700398e-01,
            2.445134137142996e+00,
            3.754408661907416e+00,
        ];
        let p_low = 0.02425;
        if p <= p_low {
            let q = (-2.0 * p.ln()).sqrt();
            (((((c[0] * q + c[1]) * q + c[2]) * q + c[3]) * q + c[4]) * q + c[5])
                / ((((d[0] * q + d[1]) * q + d[2]) * q + d[3]) * q + 1.0)
        } else if p <= 1.0 - p_low {
            let q = p - 0.5;
            let r = q * q;
            (((((a[0] * r + a[1]) * r + a[2]) * r + a[3]) * r + a[4]) * r + a[5]) * q
                / (((((b[0] * r + b[1]) * r + b[2]) * r + b[3]) * r + b[4]) * r + 1.0)
        } else {
            let q = (-2.0 * (1.0 - p).ln()).sqrt();
            -(((((c[0] * q + c[1]) * q + c[2]) * q + c[3]) * q + c[4]) * q + c[5])
                / ((((d[0] * q + d[1]) * q + d[2]) * q + d[3]) * q + 1.0)
        }
    };

    for k in 1..bins {
        if v < quantile(k as f64 / bins as f64) {
            return k - 1;
        }
    }
    bins - 1
}

/// For an isotropic exponential kernel, the empirical covariance of
/// cell pairs separated by `d` cells should track the analytical
/// `dcvaa3` covariance within a generous tolerance.
#[test]
fn empirical_covariance_tracks_the_analytical_kernel() {
    let theta = 4.0;
    let kernel = exponential_kernel(theta);
    let n = 32usize;
    let config = LasConfig::new(n, n, n, n as f64, n as f64, n as f64, kernel, NullSink);
    let mut engine = LasEngine::init(config, 2026).unwrap();

    let samples = 40;
    let mut fields = Vec::with_capacity(samples);
    for s in 0..samples {
        let mut z = vec![0.0; n * n * n];
        engine.seed((s as i64 + 1) * 97);
        engine.sample(&mut z).unwrap();
        fields.push(z);
    }

    let idx = |i: usize, j: usize, k: usize| i + n * j + n * n * k;
    let mid = n / 2;

    let analytical_kernel = exponential_kernel(theta);
    for &d in &[1usize, 2, 4, 8] {
        let mut sum = 0.0;
        for field in &fields {
            sum += field[idx(mid, mid, mid)] * field[idx((mid + d) % n, mid, mid)];
        }
        let empirical = sum / samples as f64;
        let analytical = las3d::covariance::dcvaa3(&analytical_kernel, 1.0, 1.0, 1.0, d as f64, 0.0, 0.0);
        assert!(
            (empirical - analytical).abs() < 0.05 * analytical.max(1e-6).abs() + 0.05,
            "d={d}: empirical={empirical}, analytical={analytical}"
        );
    }
}

/// End-to-end scenario: a grid requiring several subdivisions still
/// produces a finite, non-degenerate field and reports consistent stats.
#[test]
fn multi_stage_refinement_end_to_end() {
    let config = LasConfig::new(64, 64, 64, 1.0, 1.0, 1.0, exponential_kernel(0.2), NullSink);
    let mut engine = LasEngine::init(config, 4242).unwrap();
    assert_eq!(engine.decomposition().m, 3);

    let mut z = vec![0.0; 64 * 64 * 64];
    engine.sample(&mut z).unwrap();
    assert!(z.iter().all(|v| v.is_finite()));

    let mean: f64 = z.iter().sum::<f64>() / z.len() as f64;
    let variance: f64 = z.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / z.len() as f64;
    assert!(mean.abs() < 0.2, "mean = {mean}");
    assert!(variance > 0.01, "variance = {variance}");

    let stats = engine.stats();
    assert_eq!(stats.sample_count, 1);
    assert!(stats.total_sample_duration >= stats.last_sample_duration);
}

/// End-to-end scenario: an incompatible grid is rejected at init time and
/// never reaches the sampling stage.
#[test]
fn incompatible_grid_never_reaches_sampling() {
    let config = LasConfig::new(144, 256, 256, 1.0, 1.0, 1.0, exponential_kernel(1.0), NullSink);
    let err = LasEngine::init(config, 1).unwrap_err();
    assert!(matches!(err, LasError::IncompatibleGrid { .. }));
}

/// End-to-end scenario: a grid that decomposes to a single coarse cell
/// along one axis runs through the 2-D-in-3-D neighborhood builders for
/// its first refinement and still yields a finite field. A tightened
/// `k_max` is needed here: at the default 512, (16, 16, 2) already fits
/// without subdividing, which would skip the degenerate path entirely.
#[test]
fn degenerate_planar_grid_end_to_end() {
    let mut config = LasConfig::new(16, 16, 2, 1.0, 1.0, 0.25, exponential_kernel(1.5), NullSink);
    config.k_max = 300;
    let mut engine = LasEngine::init(config, 55).unwrap();
    assert_eq!(engine.decomposition().m, 1);
    let mut z = vec![0.0; 16 * 16 * 2];
    engine.sample(&mut z).unwrap();
    assert!(z.iter().all(|v| v.is_finite()));
}

/// End-to-end scenario: reseeding an existing engine changes the stream
/// without requiring a fresh `init`, and two reseeds to the same value
/// reproduce the same field.
#[test]
fn reseeding_an_existing_engine_reproduces_on_demand() {
    let config = LasConfig::new(8, 8, 8, 1.0, 1.0, 1.0, exponential_kernel(2.0), NullSink);
    let mut engine = LasEngine::init(config, 1).unwrap();

    engine.seed(909);
    let mut first = vec![0.0; 8 * 8 * 8];
    engine.sample(&mut first).unwrap();

    engine.seed(909);
    let mut second = vec![0.0; 8 * 8 * 8];
    engine.sample(&mut second).unwrap();

    assert_eq!(first, second);
}
