//! Model-family independent quality measures.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::core::Estimator;
use crate::dataset::Labeling;
use crate::types::DataMatrix;

/// Root-mean-square residual over a ground-truth inlier set.
///
/// An empty inlier set has no RMSE; it is kept as its own variant so callers
/// have to print it instead of silently averaging a `NaN`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rmse {
    Defined(f64),
    Undefined,
}

impl Rmse {
    pub fn value(&self) -> Option<f64> {
        match self {
            Rmse::Defined(v) => Some(*v),
            Rmse::Undefined => None,
        }
    }
}

impl fmt::Display for Rmse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rmse::Defined(v) => write!(f, "{v:.6}"),
            Rmse::Undefined => f.write_str("undefined"),
        }
    }
}

impl Serialize for Rmse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

/// `sqrt(mean(squared_residual))` over the rows marked in `ground_truth`.
pub fn compute_rmse<E: Estimator>(
    data: &DataMatrix,
    ground_truth: &Labeling,
    model: &E::Model,
    estimator: &E,
) -> Rmse {
    let inliers = ground_truth.inlier_indices();
    if inliers.is_empty() {
        return Rmse::Undefined;
    }
    let sum: f64 = inliers
        .iter()
        .map(|&row| estimator.squared_residual(data, row, model))
        .sum();
    Rmse::Defined((sum / inliers.len() as f64).sqrt())
}

/// Number of correspondences whose residual is within `threshold`.
pub fn inlier_count<E: Estimator>(
    data: &DataMatrix,
    model: &E::Model,
    estimator: &E,
    threshold: f64,
) -> usize {
    (0..data.nrows())
        .filter(|&row| estimator.residual(data, row, model) <= threshold)
        .count()
}

/// `log(1 - confidence) / log(1 - inlier_ratio^sample_size)`.
///
/// `None` when no finite bound exists: a confidence outside `(0, 1)`, an
/// empty inlier set, or a success probability too small to represent.
pub fn theoretical_iteration_count(
    confidence: f64,
    inlier_ratio: f64,
    sample_size: usize,
) -> Option<f64> {
    if !(confidence > 0.0 && confidence < 1.0) || !(inlier_ratio > 0.0) {
        return None;
    }
    if inlier_ratio >= 1.0 {
        return Some(1.0);
    }
    let success = inlier_ratio.powi(sample_size as i32);
    let denominator = (-success).ln_1p();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }
    Some((1.0 - confidence).ln() / denominator)
}

/// Whole number of iterations needed for `confidence`, at least one.
pub fn required_iterations(
    confidence: f64,
    inlier_ratio: f64,
    sample_size: usize,
) -> Option<usize> {
    let bound = theoretical_iteration_count(confidence, inlier_ratio, sample_size)?;
    if !bound.is_finite() || bound > usize::MAX as f64 {
        return None;
    }
    Some((bound.ceil() as usize).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Offset;

    impl Estimator for Offset {
        type Model = f64;

        fn sample_size(&self) -> usize {
            1
        }

        fn is_valid_sample(&self, _data: &DataMatrix, _sample: &[usize]) -> bool {
            true
        }

        fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<f64> {
            vec![data[(sample[0], 0)]]
        }

        fn estimate_model_nonminimal(
            &self,
            data: &DataMatrix,
            sample: &[usize],
            _weights: Option<&[f64]>,
        ) -> Vec<f64> {
            self.estimate_model(data, sample)
        }

        fn is_valid_model(&self, _: &f64, _: &DataMatrix, _: &[usize], _: f64) -> bool {
            true
        }

        fn residual(&self, data: &DataMatrix, row: usize, model: &f64) -> f64 {
            (data[(row, 0)] - model).abs()
        }
    }

    #[test]
    fn rmse_averages_squared_residuals_of_ground_truth() {
        let data = DataMatrix::from_row_slice(4, 1, &[1.0, -3.0, 100.0, 0.0]);
        let labels = Labeling::new(vec![true, true, false, true]);
        let rmse = compute_rmse(&data, &labels, &0.0, &Offset);
        assert_relative_eq!(rmse.value().unwrap(), (10.0f64 / 3.0).sqrt());
    }

    #[test]
    fn rmse_of_empty_ground_truth_is_undefined() {
        let data = DataMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        let rmse = compute_rmse(&data, &Labeling::new(vec![false, false]), &0.0, &Offset);
        assert_eq!(rmse, Rmse::Undefined);
        assert_eq!(rmse.to_string(), "undefined");
        assert_eq!(serde_json::to_string(&rmse).unwrap(), "null");
    }

    #[test]
    fn inlier_count_is_monotonic_in_threshold() {
        let data = DataMatrix::from_row_slice(6, 1, &[0.0, 0.4, 0.9, 1.5, 2.5, 7.0]);
        let thresholds = [0.0, 0.5, 1.0, 2.0, 3.0, 10.0];
        let counts: Vec<usize> = thresholds
            .iter()
            .map(|&t| inlier_count(&data, &0.0, &Offset, t))
            .collect();
        assert!(counts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(counts, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn theoretical_bound_matches_closed_form() {
        let bound = theoretical_iteration_count(0.99, 0.5, 4).unwrap();
        assert_relative_eq!(bound, 0.01f64.ln() / (1.0 - 0.0625f64).ln());
        assert_eq!(required_iterations(0.99, 0.5, 4), Some(72));
    }

    #[test]
    fn theoretical_bound_edge_cases() {
        assert_eq!(theoretical_iteration_count(0.99, 0.0, 4), None);
        assert_eq!(theoretical_iteration_count(0.99, 1.0, 7), Some(1.0));
        assert_eq!(theoretical_iteration_count(1.0, 0.5, 4), None);
        assert_eq!(theoretical_iteration_count(0.99, 1e-200, 8), None);
        assert_eq!(required_iterations(0.5, 0.99, 1), Some(1));
    }
}
