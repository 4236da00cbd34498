//! Model quality scores.
//!
//! Two strategies plug into the [`Scoring`] trait:
//! - [`MagsacPlusPlusScoring`]: sigma-consensus++, the noise-scale-marginalized
//!   loss with the gamma values precomputed by `build.rs`;
//! - [`InlierCountScoring`]: the plain RANSAC inlier count, used by the
//!   baseline runs.

use std::cmp::Ordering;

use serde::Serialize;

use crate::core::{Estimator, Scoring};
use crate::types::DataMatrix;

mod sigma_lut {
    include!(concat!(env!("OUT_DIR"), "/sigma_lut.rs"));
}

pub use sigma_lut::{SIGMA_DOF, SIGMA_QUANTILE};
use sigma_lut::{LOWER_GAMMA_AT_QUANTILE, SIGMA_LUT, SIGMA_LUT_SAMPLES, UPPER_GAMMA_AT_QUANTILE};

/// Quality of a model hypothesis.
///
/// Higher is better. Scores are ordered by `value` first and fall back to the
/// inlier count on ties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    /// Correspondences within the strategy's inlier threshold.
    pub inlier_count: usize,
    pub value: f64,
}

impl Score {
    pub fn new(inlier_count: usize, value: f64) -> Self {
        Self {
            inlier_count,
            value,
        }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.value.partial_cmp(&other.value)? {
            Ordering::Equal => Some(self.inlier_count.cmp(&other.inlier_count)),
            ordering => Some(ordering),
        }
    }
}

/// Linear interpolation into the gamma table at `t = residual / sigma_max`.
fn lookup_gamma(t: f64) -> (f64, f64) {
    let position = (t / SIGMA_QUANTILE).clamp(0.0, 1.0) * (SIGMA_LUT_SAMPLES - 1) as f64;
    let lo = position.floor() as usize;
    let hi = (lo + 1).min(SIGMA_LUT_SAMPLES - 1);
    let frac = position - lo as f64;
    let (u0, l0) = SIGMA_LUT[lo];
    let (u1, l1) = SIGMA_LUT[hi];
    (u0 + (u1 - u0) * frac, l0 + (l1 - l0) * frac)
}

/// Sigma-consensus++ scoring.
///
/// The noise scale is marginalized over `[0, sigma_max]` with
/// `sigma_max = maximum_threshold / k`, `k` the chi quantile of
/// [`SIGMA_QUANTILE`]. A correspondence farther than the maximum threshold
/// pays the constant outlier loss. The score value is the negated total loss;
/// the inlier count is taken at the reference threshold.
#[derive(Debug, Clone)]
pub struct MagsacPlusPlusScoring {
    maximum_threshold: f64,
    reference_threshold: f64,
    sigma_max: f64,
    loss_multiplier: f64,
    outlier_loss: f64,
}

impl MagsacPlusPlusScoring {
    pub fn new(maximum_threshold: f64, reference_threshold: f64) -> Self {
        let sigma_max = maximum_threshold / SIGMA_QUANTILE;
        let sigma_max_sq = sigma_max * sigma_max;
        let loss_multiplier = 0.25 * 2f64.powf((SIGMA_DOF as f64 + 1.0) / 2.0) / sigma_max;
        Self {
            maximum_threshold,
            reference_threshold,
            sigma_max,
            loss_multiplier,
            outlier_loss: loss_multiplier * sigma_max_sq / 2.0 * LOWER_GAMMA_AT_QUANTILE,
        }
    }

    pub fn reference_threshold(&self) -> f64 {
        self.reference_threshold
    }

    /// Marginalized loss of one correspondence.
    pub fn loss(&self, residual: f64) -> f64 {
        if !(residual < self.maximum_threshold) {
            return self.outlier_loss;
        }
        let (upper, lower) = lookup_gamma(residual / self.sigma_max);
        let sigma_max_sq = self.sigma_max * self.sigma_max;
        self.loss_multiplier
            * (sigma_max_sq / 2.0 * lower
                + residual * residual / 4.0 * (upper - UPPER_GAMMA_AT_QUANTILE))
    }
}

impl Scoring for MagsacPlusPlusScoring {
    fn threshold(&self) -> f64 {
        self.maximum_threshold
    }

    fn score<E: Estimator>(
        &self,
        data: &DataMatrix,
        estimator: &E,
        model: &E::Model,
        inliers_out: &mut Vec<usize>,
    ) -> Score {
        inliers_out.clear();
        let mut total_loss = 0.0;
        for row in 0..data.nrows() {
            let residual = estimator.residual(data, row, model);
            if residual <= self.reference_threshold {
                inliers_out.push(row);
            }
            total_loss += self.loss(residual);
        }
        Score::new(inliers_out.len(), -total_loss)
    }

    /// Marginalized IRLS weight, zero at and beyond the maximum threshold.
    fn weight(&self, residual: f64) -> f64 {
        if !(residual < self.maximum_threshold) {
            return 0.0;
        }
        let (upper, _) = lookup_gamma(residual / self.sigma_max);
        (upper - UPPER_GAMMA_AT_QUANTILE).max(0.0)
    }
}

/// RANSAC-style scoring that counts correspondences within the threshold.
#[derive(Debug, Clone)]
pub struct InlierCountScoring {
    threshold: f64,
}

impl InlierCountScoring {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Scoring for InlierCountScoring {
    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn score<E: Estimator>(
        &self,
        data: &DataMatrix,
        estimator: &E,
        model: &E::Model,
        inliers_out: &mut Vec<usize>,
    ) -> Score {
        inliers_out.clear();
        for row in 0..data.nrows() {
            if estimator.residual(data, row, model) <= self.threshold {
                inliers_out.push(row);
            }
        }
        Score::new(inliers_out.len(), inliers_out.len() as f64)
    }

    fn weight(&self, residual: f64) -> f64 {
        if residual <= self.threshold {
            1.0
        } else {
            0.0
        }
    }
}
