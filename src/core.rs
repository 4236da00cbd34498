//! Core traits of the robust estimation pipeline.
//!
//! The benchmark harness talks to two capabilities:
//! - an [`Estimator`] for one geometric model family (minimal and non-minimal
//!   fitting, per-correspondence residuals), and
//! - a [`RobustEstimator`] engine that draws samples through a [`Sampler`],
//!   fits candidates with the estimator and returns the best model it found.
//!
//! Everything else (scoring, termination, local optimization) plugs into the
//! engine through the traits defined here and in [`crate::optimisers`].

use crate::scoring::Score;
use crate::types::DataMatrix;

/// Model capability for a single geometric family.
///
/// All methods are pure functions of the correspondences and the model; the
/// estimator carries no per-run state.
pub trait Estimator {
    /// Model type produced by this estimator.
    type Model: Clone;

    /// Size of a minimal sample for this estimator.
    fn sample_size(&self) -> usize;

    /// Smallest sample the non-minimal (least-squares) solver accepts.
    fn non_minimal_sample_size(&self) -> usize {
        self.sample_size()
    }

    /// Check whether a given sample is geometrically valid.
    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool;

    /// Estimate candidate models from a minimal sample.
    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model>;

    /// Fit a model to an arbitrary-size sample in the least-squares sense.
    ///
    /// `weights`, when given, is indexed by data row (not by sample position).
    fn estimate_model_nonminimal(
        &self,
        data: &DataMatrix,
        sample: &[usize],
        weights: Option<&[f64]>,
    ) -> Vec<Self::Model>;

    /// Validate a candidate model before scoring.
    fn is_valid_model(
        &self,
        model: &Self::Model,
        data: &DataMatrix,
        sample: &[usize],
        threshold: f64,
    ) -> bool;

    /// Non-negative distance of correspondence `row` to `model`.
    fn residual(&self, data: &DataMatrix, row: usize, model: &Self::Model) -> f64;

    /// Squared residual, accumulated for RMSE.
    fn squared_residual(&self, data: &DataMatrix, row: usize, model: &Self::Model) -> f64 {
        let r = self.residual(data, row, model);
        r * r
    }
}

/// Sampler responsible for drawing minimal samples from the data.
pub trait Sampler {
    /// Draw a sample of `sample_size` elements into `out_indices`.
    ///
    /// Returns `false` if a valid sample could not be drawn (caller may retry).
    fn sample(&mut self, data: &DataMatrix, sample_size: usize, out_indices: &mut [usize]) -> bool;

    /// Update the sampler state given the last sample and iteration.
    fn update(&mut self, sample: &[usize], sample_size: usize, iteration: usize, score_hint: f64);
}

/// Scoring strategy used to evaluate model quality and determine inliers.
pub trait Scoring {
    /// Residual cutoff beyond which a correspondence contributes nothing but
    /// the outlier penalty.
    fn threshold(&self) -> f64;

    /// Score `model` on every correspondence, collecting the rows counted as
    /// inliers into `inliers_out`.
    fn score<E: Estimator>(
        &self,
        data: &DataMatrix,
        estimator: &E,
        model: &E::Model,
        inliers_out: &mut Vec<usize>,
    ) -> Score;

    /// Least-squares weight of a correspondence with the given residual.
    fn weight(&self, residual: f64) -> f64;
}

/// Termination criterion deciding when the sampling loop can stop.
pub trait TerminationCriterion {
    /// Update the iteration budget given the current best score.
    ///
    /// Returns `true` if the algorithm should terminate immediately.
    fn check(
        &mut self,
        data: &DataMatrix,
        best_score: &Score,
        sample_size: usize,
        max_iterations: &mut usize,
    ) -> bool;
}

/// Standard adaptive bound
/// `N = log(1 - confidence) / log(1 - inlier_ratio^sample_size)`.
///
/// Only ever lowers the iteration budget; the hard cap configured on the
/// engine stays an upper bound.
pub struct RansacTerminationCriterion {
    /// Desired confidence in \[0, 1\].
    pub confidence: f64,
}

impl TerminationCriterion for RansacTerminationCriterion {
    fn check(
        &mut self,
        data: &DataMatrix,
        best_score: &Score,
        sample_size: usize,
        max_iterations: &mut usize,
    ) -> bool {
        let n = data.nrows();
        if n == 0 {
            return false;
        }

        let inlier_ratio = best_score.inlier_count as f64 / n as f64;
        if let Some(required) =
            crate::metrics::required_iterations(self.confidence, inlier_ratio, sample_size)
        {
            if required < *max_iterations {
                *max_iterations = required;
            }
        }

        false
    }
}

/// Outcome of one engine run.
#[derive(Clone, Debug)]
pub struct Estimate<M> {
    /// Best model found, `None` when no candidate ever passed validation.
    pub model: Option<M>,
    /// Number of sampling iterations actually drawn.
    pub iterations: usize,
    /// Score of the returned model.
    pub score: Option<Score>,
}

impl<M> Estimate<M> {
    pub fn failed(iterations: usize) -> Self {
        Self {
            model: None,
            iterations,
            score: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.model.is_some()
    }
}

/// Robust estimation engine contract consumed by the benchmark harness.
///
/// Thresholds are plain scalars in whatever unit the correspondences are
/// expressed in; callers normalizing the data are responsible for handing
/// normalized thresholds.
pub trait RobustEstimator {
    /// Upper bound on the noise scale considered by the engine.
    fn set_maximum_threshold(&mut self, threshold: f64);

    /// Threshold used internally to count inliers for the stopping bound.
    fn set_reference_threshold(&mut self, threshold: f64);

    /// Hard cap on the number of sampling iterations.
    fn set_iteration_limit(&mut self, limit: usize);

    /// Search for the best model of `estimator`'s family.
    fn run<E: Estimator, S: Sampler>(
        &mut self,
        data: &DataMatrix,
        confidence: f64,
        estimator: &E,
        sampler: &mut S,
    ) -> Estimate<E::Model>;

    /// Mark every correspondence whose residual is within `threshold`.
    fn inlier_mask<E: Estimator>(
        &self,
        data: &DataMatrix,
        model: &E::Model,
        estimator: &E,
        threshold: f64,
    ) -> Vec<bool> {
        (0..data.nrows())
            .map(|row| estimator.residual(data, row, model) <= threshold)
            .collect()
    }
}
