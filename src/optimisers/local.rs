use super::LocalOptimizer;
use crate::core::{Estimator, Scoring};
use crate::scoring::Score;
use crate::types::DataMatrix;

/// Least-squares optimizer that refits the model to all of its inliers once.
///
/// Used with inlier-count scoring, where every inlier carries the same weight.
#[derive(Debug, Clone, Default)]
pub struct LeastSquaresOptimizer;

impl LocalOptimizer for LeastSquaresOptimizer {
    fn run<E: Estimator, Sc: Scoring>(
        &mut self,
        data: &DataMatrix,
        estimator: &E,
        scoring: &Sc,
        model: &E::Model,
        score: &Score,
        inliers: &[usize],
    ) -> (E::Model, Score, Vec<usize>) {
        let unchanged = || (model.clone(), score.clone(), inliers.to_vec());
        if inliers.len() < estimator.non_minimal_sample_size() {
            return unchanged();
        }

        let mut best = unchanged();
        let mut refined_inliers = Vec::new();
        for candidate in estimator.estimate_model_nonminimal(data, inliers, None) {
            let refined_score = scoring.score(data, estimator, &candidate, &mut refined_inliers);
            if refined_score > best.1 {
                best = (candidate, refined_score, refined_inliers.clone());
            }
        }
        best
    }
}

/// Iteratively re-weighted least squares with the scoring's own weights.
///
/// Every round weights each correspondence by `Scoring::weight` of its
/// residual under the current model, refits with the non-zero-weight rows and
/// keeps the result while the score keeps improving.
#[derive(Debug, Clone)]
pub struct IrlsOptimizer {
    max_iterations: usize,
}

impl Default for IrlsOptimizer {
    fn default() -> Self {
        Self::new(10)
    }
}

impl IrlsOptimizer {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations }
    }
}

impl LocalOptimizer for IrlsOptimizer {
    fn run<E: Estimator, Sc: Scoring>(
        &mut self,
        data: &DataMatrix,
        estimator: &E,
        scoring: &Sc,
        model: &E::Model,
        score: &Score,
        inliers: &[usize],
    ) -> (E::Model, Score, Vec<usize>) {
        let mut current = (model.clone(), score.clone(), inliers.to_vec());
        let mut weights = vec![0.0; data.nrows()];
        let mut support = Vec::with_capacity(data.nrows());
        let mut refined_inliers = Vec::new();

        for _ in 0..self.max_iterations {
            support.clear();
            for (row, weight) in weights.iter_mut().enumerate() {
                *weight = scoring.weight(estimator.residual(data, row, &current.0));
                if *weight > 0.0 {
                    support.push(row);
                }
            }
            if support.len() < estimator.non_minimal_sample_size() {
                break;
            }

            let mut improved = false;
            for candidate in estimator.estimate_model_nonminimal(data, &support, Some(&weights)) {
                let refined_score =
                    scoring.score(data, estimator, &candidate, &mut refined_inliers);
                if refined_score > current.1 {
                    current = (candidate, refined_score, refined_inliers.clone());
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }

        current
    }
}
