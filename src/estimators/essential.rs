//! Essential matrix estimator for correspondences in normalized camera coordinates.

use crate::core::Estimator;
use crate::estimators::fundamental::{epipolar_row, unit_frobenius};
use crate::models::EssentialMatrix;
use crate::types::DataMatrix;
use crate::utils::{is_distinct_sample, matrix3_from_row_major, null_vector_9, sampson_distance};
use nalgebra::{DMatrix, Matrix3, Vector3};

/// Essential matrix estimator.
///
/// Expects `x1 y1 x2 y2` already multiplied by the inverse intrinsics of the
/// respective views. Every fit (minimal or not) is a linear 8-point solve
/// followed by projection onto the essential manifold, i.e. singular values
/// `(s, s, 0)`. Residuals are Sampson distances in normalized units.
pub struct EssentialEstimator;

impl Default for EssentialEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl EssentialEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Closest essential matrix in Frobenius norm.
    fn enforce_essential_constraints(&self, e: Matrix3<f64>) -> Option<Matrix3<f64>> {
        let svd = e.svd(true, true);
        let (u, v_t) = (svd.u?, svd.v_t?);
        let s = svd.singular_values;
        let smallest = s.imin();

        let mut projected = Vector3::zeros();
        let mean = (s.sum() - s[smallest]) / 2.0;
        for i in 0..3 {
            if i != smallest {
                projected[i] = mean;
            }
        }
        unit_frobenius(u * Matrix3::from_diagonal(&projected) * v_t)
    }
}

impl Estimator for EssentialEstimator {
    type Model = EssentialMatrix;

    fn sample_size(&self) -> usize {
        8
    }

    fn is_valid_sample(&self, _data: &DataMatrix, sample: &[usize]) -> bool {
        is_distinct_sample(sample, self.sample_size())
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model> {
        self.estimate_model_nonminimal(data, sample, None)
    }

    fn estimate_model_nonminimal(
        &self,
        data: &DataMatrix,
        sample: &[usize],
        weights: Option<&[f64]>,
    ) -> Vec<Self::Model> {
        let n = sample.len();
        if n < self.sample_size() {
            return Vec::new();
        }

        // Normalized camera coordinates are already well conditioned; no
        // Hartley transform, which would not preserve the essential structure.
        let mut a = DMatrix::<f64>::zeros(n, 9);
        for (i, &idx) in sample.iter().enumerate() {
            let w = weights.map_or(1.0, |w| w[idx]);
            let row = epipolar_row(
                data[(idx, 0)],
                data[(idx, 1)],
                data[(idx, 2)],
                data[(idx, 3)],
                w,
            );
            for (c, value) in row.iter().enumerate() {
                a[(i, c)] = *value;
            }
        }

        let Some(e) = null_vector_9(&a) else {
            return Vec::new();
        };
        self.enforce_essential_constraints(matrix3_from_row_major(e.as_slice()))
            .map(EssentialMatrix::new)
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
        model.e.iter().all(|x| x.is_finite())
    }

    fn residual(&self, data: &DataMatrix, row: usize, model: &Self::Model) -> f64 {
        sampson_distance(&model.e, data, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn skew(t: &Vector3<f64>) -> Matrix3<f64> {
        Matrix3::new(0.0, -t.z, t.y, t.z, 0.0, -t.x, -t.y, t.x, 0.0)
    }

    fn calibrated_scene(count: usize) -> (DataMatrix, Matrix3<f64>) {
        let r = Rotation3::from_euler_angles(0.03, 0.08, -0.02);
        let t = Vector3::new(-0.5, 0.1, 0.05);

        let mut data = DataMatrix::zeros(count, 4);
        for i in 0..count {
            let fi = i as f64;
            let x = Vector3::new(
                (fi * 0.91).sin() * 1.8,
                (fi * 0.57).cos() * 1.2,
                4.0 + (fi * 0.29).cos() * 1.5,
            );
            let y = r * x + t;
            data[(i, 0)] = x.x / x.z;
            data[(i, 1)] = x.y / x.z;
            data[(i, 2)] = y.x / y.z;
            data[(i, 3)] = y.y / y.z;
        }
        (data, skew(&t) * r.matrix())
    }

    #[test]
    fn recovers_essential_matrix_up_to_scale() {
        let (data, truth) = calibrated_scene(20);
        let estimator = EssentialEstimator::new();
        let sample: Vec<usize> = (0..8).collect();

        assert!(estimator.is_valid_sample(&data, &sample));
        let models = estimator.estimate_model(&data, &sample);
        assert_eq!(models.len(), 1);

        let e = models[0].e;
        let truth = truth / truth.norm();
        let aligned = if (e - truth).norm() < (e + truth).norm() {
            e
        } else {
            -e
        };
        assert_relative_eq!(aligned, truth, epsilon = 1e-6);

        for row in 0..data.nrows() {
            assert!(estimator.residual(&data, row, &models[0]) < 1e-8);
        }
    }

    #[test]
    fn fitted_matrix_has_essential_singular_values() {
        let (mut data, _) = calibrated_scene(30);
        // Perturb so the linear solution is not exactly essential.
        for i in 0..30 {
            data[(i, 2)] += ((i * 7) as f64).sin() * 1e-3;
        }
        let estimator = EssentialEstimator::new();
        let sample: Vec<usize> = (0..30).collect();
        let models = estimator.estimate_model_nonminimal(&data, &sample, None);
        assert_eq!(models.len(), 1);

        let mut s: Vec<f64> = models[0].e.singular_values().iter().copied().collect();
        s.sort_by(f64::total_cmp);
        assert!(s[0].abs() < 1e-10);
        assert_relative_eq!(s[1], s[2], epsilon = 1e-10);
    }
}
