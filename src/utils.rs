//! Numerical helpers shared by the estimators and samplers.
//!
//! Holds the seeded uniform index generator used for minimal sampling, the
//! small dense solvers behind the minimal estimators, Hartley point
//! conditioning and the first-order (Sampson) epipolar distance.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use rand::distributions::uniform::SampleUniform;
use rand::distributions::Uniform;
use rand::prelude::*;

use crate::types::DataMatrix;

/// Uniform integer random-number generator.
///
/// By default this uses an entropy-seeded RNG, but test code and reproducible
/// benchmark runs construct it from a fixed seed.
pub struct UniformRandomGenerator<T>
where
    T: Copy + SampleUniform + PartialOrd,
{
    rng: StdRng,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Default for UniformRandomGenerator<T>
where
    T: Copy + SampleUniform + PartialOrd,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> UniformRandomGenerator<T>
where
    T: Copy + SampleUniform + PartialOrd,
{
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            _marker: std::marker::PhantomData,
        }
    }

    /// Fill `out` with pairwise distinct values from `[min, max]`.
    ///
    /// Rejection sampling; intended for the small sample sizes of minimal
    /// solvers. The caller guarantees the range holds at least `out.len()` values.
    pub fn gen_unique(&mut self, out: &mut [T], min: T, max: T) {
        let dist = Uniform::new_inclusive(min, max);
        for i in 0..out.len() {
            loop {
                let candidate = self.rng.sample(&dist);
                if out[..i].iter().all(|v| *v != candidate) {
                    out[i] = candidate;
                    break;
                }
            }
        }
    }
}

/// True when `sample` holds at least `size` indices and no index repeats.
pub fn is_distinct_sample(sample: &[usize], size: usize) -> bool {
    if sample.len() < size {
        return false;
    }
    for i in 0..sample.len() {
        for j in (i + 1)..sample.len() {
            if sample[i] == sample[j] {
                return false;
            }
        }
    }
    true
}

/// Gaussian elimination with partial pivoting to solve `A * x = b`.
///
/// `augmented` is `[A | b]` with `A` of size n x n. Returns `false` when a
/// pivot vanishes.
pub fn gauss_elimination(augmented: &mut DMatrix<f64>, result: &mut DVector<f64>) -> bool {
    let n = augmented.nrows();
    if n + 1 != augmented.ncols() || n != result.len() {
        return false;
    }

    for i in 0..n {
        let mut max_row = i;
        let mut max_val = augmented[(i, i)].abs();
        for k in (i + 1)..n {
            let val = augmented[(k, i)].abs();
            if val > max_val {
                max_val = val;
                max_row = k;
            }
        }

        if max_row != i {
            augmented.swap_rows(i, max_row);
        }

        if augmented[(i, i)].abs() < 1e-10 {
            return false;
        }

        for k in (i + 1)..n {
            let factor = augmented[(k, i)] / augmented[(i, i)];
            for j in i..augmented.ncols() {
                augmented[(k, j)] -= factor * augmented[(i, j)];
            }
        }
    }

    // Back-substitution
    for i in (0..n).rev() {
        result[i] = augmented[(i, n)];
        for j in (i + 1)..n {
            result[i] -= augmented[(i, j)] * result[j];
        }
        result[i] /= augmented[(i, i)];
    }

    true
}

/// Solve the monic cubic `x^3 + c2*x^2 + c1*x + c0 = 0`.
///
/// Returns the number of real roots found (1 or 3) and stores them in `roots`.
pub fn solve_cubic_real(c2: f64, c1: f64, c0: f64, roots: &mut [f64; 3]) -> usize {
    let a = c1 - c2 * c2 / 3.0;
    let b = (2.0 * c2 * c2 * c2 - 9.0 * c2 * c1) / 27.0 + c0;
    let mut c = b * b / 4.0 + a * a * a / 27.0;

    let n_roots = if c > 0.0 {
        c = c.sqrt();
        let b_neg = -0.5 * b;
        roots[0] = (b_neg + c).cbrt() + (b_neg - c).cbrt() - c2 / 3.0;
        1
    } else {
        c = 3.0 * b / (2.0 * a) * (-3.0 / a).sqrt();
        let d = 2.0 * (-a / 3.0).sqrt();
        let acos_c = c.clamp(-1.0, 1.0).acos();
        let third = std::f64::consts::FRAC_PI_3 * 2.0;
        roots[0] = d * (acos_c / 3.0).cos() - c2 / 3.0;
        roots[1] = d * (acos_c / 3.0 - third).cos() - c2 / 3.0;
        roots[2] = d * (acos_c / 3.0 - 2.0 * third).cos() - c2 / 3.0;
        3
    };

    // Single Newton step
    for root in roots.iter_mut().take(n_roots) {
        let x = *root;
        let x2 = x * x;
        let derivative = 3.0 * x2 + 2.0 * c2 * x + c1;
        if derivative.abs() > f64::EPSILON {
            *root -= (x * x2 + c2 * x2 + c1 * x + c0) / derivative;
        }
    }

    n_roots
}

/// Sample points conditioned so both views are centred with mean distance sqrt(2).
pub struct NormalizedSample {
    /// One row per sample entry, `x1 y1 x2 y2` in conditioned coordinates.
    pub points: DataMatrix,
    /// Conditioning transform of the source view.
    pub t1: Matrix3<f64>,
    /// Conditioning transform of the destination view.
    pub t2: Matrix3<f64>,
}

/// Hartley normalization of the rows of `data` selected by `sample`.
///
/// Returns `None` when either view collapses onto a single point.
pub fn hartley_normalize(data: &DataMatrix, sample: &[usize]) -> Option<NormalizedSample> {
    let n = sample.len();
    if n == 0 {
        return None;
    }
    let inv_n = 1.0 / n as f64;

    let mut centroid = [0.0; 4];
    for &idx in sample {
        for (c, value) in centroid.iter_mut().enumerate() {
            *value += data[(idx, c)] * inv_n;
        }
    }

    let mut d1 = 0.0;
    let mut d2 = 0.0;
    for &idx in sample {
        d1 += (data[(idx, 0)] - centroid[0]).hypot(data[(idx, 1)] - centroid[1]) * inv_n;
        d2 += (data[(idx, 2)] - centroid[2]).hypot(data[(idx, 3)] - centroid[3]) * inv_n;
    }
    if d1 < 1e-10 || d2 < 1e-10 {
        return None;
    }

    let s1 = std::f64::consts::SQRT_2 / d1;
    let s2 = std::f64::consts::SQRT_2 / d2;
    let t1 = Matrix3::new(
        s1, 0.0, -s1 * centroid[0], 0.0, s1, -s1 * centroid[1], 0.0, 0.0, 1.0,
    );
    let t2 = Matrix3::new(
        s2, 0.0, -s2 * centroid[2], 0.0, s2, -s2 * centroid[3], 0.0, 0.0, 1.0,
    );

    let mut points = DataMatrix::zeros(n, 4);
    for (i, &idx) in sample.iter().enumerate() {
        points[(i, 0)] = (data[(idx, 0)] - centroid[0]) * s1;
        points[(i, 1)] = (data[(idx, 1)] - centroid[1]) * s1;
        points[(i, 2)] = (data[(idx, 2)] - centroid[2]) * s2;
        points[(i, 3)] = (data[(idx, 3)] - centroid[3]) * s2;
    }

    Some(NormalizedSample { points, t1, t2 })
}

/// Absolute Sampson distance of correspondence `row` to the epipolar geometry `f`.
///
/// First-order approximation of the geometric error of `x2^T F x1 = 0`; the
/// gradient of the constraint is taken with respect to both image points.
pub fn sampson_distance(f: &Matrix3<f64>, data: &DataMatrix, row: usize) -> f64 {
    let x1 = Vector3::new(data[(row, 0)], data[(row, 1)], 1.0);
    let x2 = Vector3::new(data[(row, 2)], data[(row, 3)], 1.0);
    let c = x2.dot(&(f * x1));

    let f_x1 = f * x1;
    let ft_x2 = f.transpose() * x2;
    let gradient =
        (f_x1[0] * f_x1[0] + f_x1[1] * f_x1[1] + ft_x2[0] * ft_x2[0] + ft_x2[1] * ft_x2[1]).sqrt();

    if gradient < 1e-15 {
        return if c.abs() < 1e-15 { 0.0 } else { f64::MAX };
    }
    (c / gradient).abs()
}

/// Row-major 3x3 matrix from the first nine entries of `v`.
pub fn matrix3_from_row_major(v: &[f64]) -> Matrix3<f64> {
    Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8])
}

/// Right null vector of `a` (n x 9), taken from the eigenvector of `A^T A`
/// with the smallest eigenvalue.
///
/// Working on the 9x9 normal matrix keeps the full right-singular basis even
/// when `a` has fewer rows than columns.
pub fn null_vector_9(a: &DMatrix<f64>) -> Option<DVector<f64>> {
    null_space_9(a, 1).map(|mut basis| basis.remove(0))
}

/// The `dim` right singular vectors of `a` with the smallest singular values,
/// ordered from smallest upwards.
pub fn null_space_9(a: &DMatrix<f64>, dim: usize) -> Option<Vec<DVector<f64>>> {
    let ata = a.transpose() * a;
    let svd = ata.svd(false, true);
    let v_t = svd.v_t?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&i, &j| svd.singular_values[i].total_cmp(&svd.singular_values[j]));

    let basis: Vec<DVector<f64>> = order
        .iter()
        .take(dim)
        .map(|&i| v_t.row(i).transpose().into_owned())
        .collect();
    if basis.len() < dim || basis.iter().any(|v| v.iter().any(|x| !x.is_finite())) {
        return None;
    }
    Some(basis)
}
