//! Homography estimator: 4-point minimal solver and normalized weighted DLT.

use crate::core::Estimator;
use crate::models::Homography;
use crate::types::DataMatrix;
use crate::utils::{
    gauss_elimination, hartley_normalize, is_distinct_sample, matrix3_from_row_major,
    null_vector_9,
};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

/// Homography estimator for planar scenes and pure rotations.
///
/// The residual is the forward transfer error `|| pi(H x1) - x2 ||` in the
/// destination image.
pub struct HomographyEstimator;

impl Default for HomographyEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl HomographyEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Solve the 8x8 system obtained by fixing `h[8] = 1`.
    fn estimate_minimal_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Homography> {
        let mut augmented = DMatrix::<f64>::zeros(8, 9);

        for (i, &idx) in sample.iter().enumerate() {
            let x1 = data[(idx, 0)];
            let y1 = data[(idx, 1)];
            let x2 = data[(idx, 2)];
            let y2 = data[(idx, 3)];

            augmented[(2 * i, 0)] = -x1;
            augmented[(2 * i, 1)] = -y1;
            augmented[(2 * i, 2)] = -1.0;
            augmented[(2 * i, 6)] = x2 * x1;
            augmented[(2 * i, 7)] = x2 * y1;
            augmented[(2 * i, 8)] = -x2;

            augmented[(2 * i + 1, 3)] = -x1;
            augmented[(2 * i + 1, 4)] = -y1;
            augmented[(2 * i + 1, 5)] = -1.0;
            augmented[(2 * i + 1, 6)] = y2 * x1;
            augmented[(2 * i + 1, 7)] = y2 * y1;
            augmented[(2 * i + 1, 8)] = -y2;
        }

        let mut h = DVector::<f64>::zeros(8);
        if !gauss_elimination(&mut augmented, &mut h) {
            return Vec::new();
        }
        if h.iter().any(|x| !x.is_finite()) {
            return Vec::new();
        }

        let h_mat = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        vec![Homography::new(h_mat)]
    }
}

/// Twice the signed area of the triangle `(a, b, c)`, relative to its side lengths.
fn relative_area(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let ab = (b.0 - a.0, b.1 - a.1);
    let ac = (c.0 - a.0, c.1 - a.1);
    let cross = ab.0 * ac.1 - ab.1 * ac.0;
    let scale = ab.0.hypot(ab.1) * ac.0.hypot(ac.1);
    if scale <= f64::EPSILON {
        return 0.0;
    }
    cross / scale
}

impl Estimator for HomographyEstimator {
    type Model = Homography;

    fn sample_size(&self) -> usize {
        4
    }

    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool {
        if !is_distinct_sample(sample, self.sample_size()) {
            return false;
        }
        if sample.len() != self.sample_size() {
            return true;
        }

        // Reject samples with three (near-)collinear points in either image.
        for offset in [0usize, 2] {
            let p = |i: usize| (data[(sample[i], offset)], data[(sample[i], offset + 1)]);
            for (a, b, c) in [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)] {
                if relative_area(p(a), p(b), p(c)).abs() < 1e-6 {
                    return false;
                }
            }
        }
        true
    }

    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model> {
        let n = sample.len();
        if n < self.sample_size() {
            return Vec::new();
        }
        if n == self.sample_size() {
            return self.estimate_minimal_model(data, sample);
        }
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

        let Some(normalized) = hartley_normalize(data, sample) else {
            return Vec::new();
        };
        let points = &normalized.points;

        let mut a = DMatrix::<f64>::zeros(2 * n, 9);
        for (i, &idx) in sample.iter().enumerate() {
            let x1 = points[(i, 0)];
            let y1 = points[(i, 1)];
            let x2 = points[(i, 2)];
            let y2 = points[(i, 3)];
            let w = weights.map_or(1.0, |w| w[idx]);

            a[(2 * i, 0)] = -w * x1;
            a[(2 * i, 1)] = -w * y1;
            a[(2 * i, 2)] = -w;
            a[(2 * i, 6)] = w * x2 * x1;
            a[(2 * i, 7)] = w * x2 * y1;
            a[(2 * i, 8)] = w * x2;

            a[(2 * i + 1, 3)] = -w * x1;
            a[(2 * i + 1, 4)] = -w * y1;
            a[(2 * i + 1, 5)] = -w;
            a[(2 * i + 1, 6)] = w * y2 * x1;
            a[(2 * i + 1, 7)] = w * y2 * y1;
            a[(2 * i + 1, 8)] = w * y2;
        }

        let Some(h) = null_vector_9(&a) else {
            return Vec::new();
        };
        let Some(t2_inv) = normalized.t2.try_inverse() else {
            return Vec::new();
        };

        let mut h_mat = t2_inv * matrix3_from_row_major(h.as_slice()) * normalized.t1;
        if h_mat[(2, 2)].abs() > 1e-12 {
            h_mat /= h_mat[(2, 2)];
        } else {
            h_mat /= h_mat.norm();
        }
        if h_mat.iter().any(|x| !x.is_finite()) {
            return Vec::new();
        }

        vec![Homography::new(h_mat)]
    }

    fn is_valid_model(
        &self,
        model: &Homography,
        _data: &DataMatrix,
        _sample: &[usize],
        _threshold: f64,
    ) -> bool {
        let det = model.h.determinant().abs();
        det > 1e-4 && det < 1e4
    }

    fn residual(&self, data: &DataMatrix, row: usize, model: &Homography) -> f64 {
        let projected = model.h * Vector3::new(data[(row, 0)], data[(row, 1)], 1.0);
        if projected.z.abs() < 1e-12 {
            return f64::MAX;
        }
        let dx = projected.x / projected.z - data[(row, 2)];
        let dy = projected.y / projected.z - data[(row, 3)];
        dx.hypot(dy)
    }
}
