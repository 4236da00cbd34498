//! Fundamental matrix estimator using the 7-point and normalized 8-point algorithms.

use crate::core::Estimator;
use crate::models::FundamentalMatrix;
use crate::types::DataMatrix;
use crate::utils::{
    hartley_normalize, is_distinct_sample, matrix3_from_row_major, null_space_9, null_vector_9,
    sampson_distance, solve_cubic_real,
};
use nalgebra::{DMatrix, Matrix3};

/// Fundamental matrix estimator.
///
/// Minimal samples of seven correspondences go through the 7-point solver
/// (up to three real solutions); larger sets are fitted with the normalized,
/// optionally weighted 8-point algorithm. Residuals are Sampson distances in
/// pixels.
pub struct FundamentalEstimator;

impl Default for FundamentalEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Row of the epipolar constraint `x2^T F x1 = 0` for row-major `F`.
pub(crate) fn epipolar_row(x1: f64, y1: f64, x2: f64, y2: f64, w: f64) -> [f64; 9] {
    [
        w * x2 * x1,
        w * x2 * y1,
        w * x2,
        w * y2 * x1,
        w * y2 * y1,
        w * y2,
        w * x1,
        w * y1,
        w,
    ]
}

/// Scale to unit Frobenius norm, `None` for a vanishing or non-finite matrix.
pub(crate) fn unit_frobenius(m: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let norm = m.norm();
    if !norm.is_finite() || norm < 1e-15 {
        return None;
    }
    Some(m / norm)
}

/// Zero the smallest singular value.
fn enforce_rank_two(f: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let svd = f.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut s = svd.singular_values;
    let smallest = s.imin();
    s[smallest] = 0.0;
    Some(u * Matrix3::from_diagonal(&s) * v_t)
}

impl FundamentalEstimator {
    pub fn new() -> Self {
        Self
    }

    fn estimate_seven_point(&self, data: &DataMatrix, sample: &[usize]) -> Vec<FundamentalMatrix> {
        let Some(normalized) = hartley_normalize(data, sample) else {
            return Vec::new();
        };
        let points = &normalized.points;

        let mut a = DMatrix::<f64>::zeros(7, 9);
        for i in 0..7 {
            let row = epipolar_row(
                points[(i, 0)],
                points[(i, 1)],
                points[(i, 2)],
                points[(i, 3)],
                1.0,
            );
            for (c, value) in row.iter().enumerate() {
                a[(i, c)] = *value;
            }
        }

        let Some(basis) = null_space_9(&a, 2) else {
            return Vec::new();
        };
        let f1 = matrix3_from_row_major(basis[0].as_slice());
        let f2 = matrix3_from_row_major(basis[1].as_slice());

        // det(l * F1 + (1 - l) * F2) is a cubic in l; recover its coefficients
        // from four samples.
        let det_at = |l: f64| (f1 * l + f2 * (1.0 - l)).determinant();
        let d0 = det_at(0.0);
        let d1 = det_at(1.0);
        let dm1 = det_at(-1.0);
        let d2 = det_at(2.0);

        let c0 = d0;
        let c2 = (d1 + dm1) / 2.0 - c0;
        let odd = (d1 - dm1) / 2.0;
        let c3 = (d2 - c0 - 4.0 * c2 - 2.0 * odd) / 6.0;
        let c1 = odd - c3;

        let scale = c0.abs().max(c1.abs()).max(c2.abs()).max(c3.abs());
        if scale < 1e-300 || c3.abs() < 1e-12 * scale {
            return Vec::new();
        }

        let mut roots = [0.0; 3];
        let n_roots = solve_cubic_real(c2 / c3, c1 / c3, c0 / c3, &mut roots);

        roots
            .iter()
            .take(n_roots)
            .filter(|l| l.is_finite())
            .filter_map(|&l| {
                let f_norm = f1 * l + f2 * (1.0 - l);
                unit_frobenius(normalized.t2.transpose() * f_norm * normalized.t1)
            })
            .map(FundamentalMatrix::new)
            .collect()
    }
}

impl Estimator for FundamentalEstimator {
    type Model = FundamentalMatrix;

    fn sample_size(&self) -> usize {
        7
    }

    fn non_minimal_sample_size(&self) -> usize {
        8
    }

    fn is_valid_sample(&self, _data: &DataMatrix, sample: &[usize]) -> bool {
        is_distinct_sample(sample, self.sample_size())
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model> {
        match sample.len() {
            n if n < self.sample_size() => Vec::new(),
            7 => self.estimate_seven_point(data, sample),
            _ => self.estimate_model_nonminimal(data, sample, None),
        }
    }

    fn estimate_model_nonminimal(
        &self,
        data: &DataMatrix,
        sample: &[usize],
        weights: Option<&[f64]>,
    ) -> Vec<Self::Model> {
        let n = sample.len();
        if n < self.non_minimal_sample_size() {
            return Vec::new();
        }

        let Some(normalized) = hartley_normalize(data, sample) else {
            return Vec::new();
        };
        let points = &normalized.points;

        let mut a = DMatrix::<f64>::zeros(n, 9);
        for (i, &idx) in sample.iter().enumerate() {
            let w = weights.map_or(1.0, |w| w[idx]);
            let row = epipolar_row(
                points[(i, 0)],
                points[(i, 1)],
                points[(i, 2)],
                points[(i, 3)],
                w,
            );
            for (c, value) in row.iter().enumerate() {
                a[(i, c)] = *value;
            }
        }

        let Some(f) = null_vector_9(&a) else {
            return Vec::new();
        };
        let Some(f_norm) = enforce_rank_two(matrix3_from_row_major(f.as_slice())) else {
            return Vec::new();
        };

        unit_frobenius(normalized.t2.transpose() * f_norm * normalized.t1)
            .map(FundamentalMatrix::new)
            .into_iter()
            .collect()
    }

    fn is_valid_model(
        &self,
        model: &Self::Model,
        _data: &DataMatrix,
        _sample: &[usize],
        _threshold: f64,
    ) -> bool {
        // Rank-2 up to round-off; both solvers return unit Frobenius norm.
        model.f.iter().all(|x| x.is_finite()) && model.f.determinant().abs() < 1e-3
    }

    fn residual(&self, data: &DataMatrix, row: usize, model: &Self::Model) -> f64 {
        sampson_distance(&model.f, data, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    /// Two cameras with shared intrinsics observing a cloud of 3D points.
    fn synthetic_scene(count: usize) -> DataMatrix {
        let k = Matrix3::new(800.0, 0.0, 320.0, 0.0, 780.0, 240.0, 0.0, 0.0, 1.0);
        let r = Rotation3::from_euler_angles(0.02, -0.05, 0.01);
        let t = Vector3::new(0.4, 0.05, 0.02);

        let mut data = DataMatrix::zeros(count, 4);
        for i in 0..count {
            let fi = i as f64;
            let x = Vector3::new(
                (fi * 0.73).sin() * 2.0,
                (fi * 1.31).cos() * 1.5,
                5.0 + (fi * 0.37).sin() * 1.5,
            );
            let p1 = k * x;
            let p2 = k * (r * x + t);
            data[(i, 0)] = p1.x / p1.z;
            data[(i, 1)] = p1.y / p1.z;
            data[(i, 2)] = p2.x / p2.z;
            data[(i, 3)] = p2.y / p2.z;
        }
        data
    }

    #[test]
    fn seven_point_solution_explains_the_sample() {
        let data = synthetic_scene(20);
        let estimator = FundamentalEstimator::new();
        let sample: Vec<usize> = (0..7).collect();

        let models = estimator.estimate_model(&data, &sample);
        assert!(!models.is_empty(), "7-point solver should return a solution");
        assert!(models.len() <= 3);

        // One of the solutions is the true geometry and explains every point.
        let best = models
            .iter()
            .map(|m| {
                (0..data.nrows())
                    .map(|row| estimator.residual(&data, row, m))
                    .fold(0.0, f64::max)
            })
            .fold(f64::MAX, f64::min);
        assert!(best < 1e-4, "worst residual of best solution: {best}");
    }

    #[test]
    fn eight_point_fit_is_rank_two_and_consistent() {
        let data = synthetic_scene(40);
        let estimator = FundamentalEstimator::new();
        let sample: Vec<usize> = (0..40).collect();

        let models = estimator.estimate_model_nonminimal(&data, &sample, None);
        assert_eq!(models.len(), 1);
        let f = &models[0];
        assert!(estimator.is_valid_model(f, &data, &sample, 1.0));
        assert!((f.f.norm() - 1.0).abs() < 1e-12);
        for row in 0..data.nrows() {
            assert!(estimator.residual(&data, row, f) < 1e-4);
        }
    }

    #[test]
    fn rank_two_projection_drops_the_smallest_singular_value() {
        let full = Matrix3::new(3.0, 0.2, 0.1, -0.4, 2.0, 0.3, 0.5, -0.1, 0.7);
        let projected = enforce_rank_two(full).unwrap();
        let singular = projected.singular_values();
        assert!(singular.min() < 1e-12);
        assert!(projected.determinant().abs() < 1e-10);
        let original = full.singular_values();
        assert!((singular.max() - original.max()).abs() < 1e-10);
    }

    #[test]
    fn weights_exclude_corrupted_points() {
        let mut data = synthetic_scene(30);
        data[(0, 3)] += 40.0;
        data[(1, 3)] -= 35.0;
        let mut weights = vec![1.0; 30];
        weights[0] = 0.0;
        weights[1] = 0.0;

        let estimator = FundamentalEstimator::new();
        let sample: Vec<usize> = (0..30).collect();
        let models = estimator.estimate_model_nonminimal(&data, &sample, Some(&weights));
        assert_eq!(models.len(), 1);
        for row in 2..30 {
            assert!(estimator.residual(&data, row, &models[0]) < 1e-4);
        }
        assert!(estimator.residual(&data, 0, &models[0]) > 1.0);
    }

    #[test]
    fn too_few_points_yield_no_model() {
        let data = synthetic_scene(7);
        let estimator = FundamentalEstimator::new();
        let sample: Vec<usize> = (0..7).collect();
        assert!(estimator
            .estimate_model_nonminimal(&data, &sample, None)
            .is_empty());
        assert!(estimator.estimate_model(&data, &sample[..6]).is_empty());
    }
}
