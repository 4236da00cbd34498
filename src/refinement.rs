//! Ground-truth refinement.
//!
//! Manual labelings of the benchmark scenes are conservative: annotators
//! mark a subset of the true inliers. The refinement fits one model to the
//! marked subset with the estimator's non-minimal solver and relabels every
//! correspondence against it. The ground truth used for scoring is whichever
//! of the two labelings has more inliers, ties keeping the manual one.

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::core::Estimator;
use crate::dataset::Labeling;
use crate::normalization::Threshold;
use crate::types::DataMatrix;

#[derive(Debug, Error, PartialEq)]
pub enum RefinementError {
    #[error("labeling has {labels} entries for {points} correspondences")]
    LengthMismatch { labels: usize, points: usize },

    #[error("{found} reference inliers, at least {required} needed to fit a model")]
    InsufficientInliers { found: usize, required: usize },

    #[error("no model could be fitted to the reference inliers")]
    FitFailed,
}

/// Refit on the reference inliers and relabel with `residual <= threshold`.
pub fn refine_labeling<E: Estimator, T: Threshold>(
    data: &DataMatrix,
    reference: &Labeling,
    estimator: &E,
    threshold: T,
) -> Result<Labeling, RefinementError> {
    if reference.len() != data.nrows() {
        return Err(RefinementError::LengthMismatch {
            labels: reference.len(),
            points: data.nrows(),
        });
    }

    let inliers = reference.inlier_indices();
    let required = estimator
        .non_minimal_sample_size()
        .max(estimator.sample_size());
    if inliers.len() < required {
        return Err(RefinementError::InsufficientInliers {
            found: inliers.len(),
            required,
        });
    }

    let threshold = threshold.value();
    let labels = estimator
        .estimate_model_nonminimal(data, &inliers, None)
        .iter()
        .map(|model| {
            (0..data.nrows())
                .map(|row| estimator.residual(data, row, model) <= threshold)
                .collect::<Vec<bool>>()
        })
        .max_by_key(|labels| labels.iter().filter(|&&l| l).count())
        .ok_or(RefinementError::FitFailed)?;

    Ok(Labeling::new(labels))
}

/// Which labeling ended up as ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundTruthSource {
    Reference,
    Refined,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundTruth {
    pub labeling: Labeling,
    pub source: GroundTruthSource,
}

impl GroundTruth {
    pub fn inlier_count(&self) -> usize {
        self.labeling.inlier_count()
    }
}

/// Keep the refined labeling only if it has strictly more inliers.
pub fn select_ground_truth(reference: Labeling, refined: Labeling) -> GroundTruth {
    if refined.inlier_count() > reference.inlier_count() {
        GroundTruth {
            labeling: refined,
            source: GroundTruthSource::Refined,
        }
    } else {
        GroundTruth {
            labeling: reference,
            source: GroundTruthSource::Reference,
        }
    }
}

/// [`refine_labeling`] followed by [`select_ground_truth`].
pub fn derive_ground_truth<E: Estimator, T: Threshold>(
    data: &DataMatrix,
    reference: &Labeling,
    estimator: &E,
    threshold: T,
) -> Result<GroundTruth, RefinementError> {
    let refined = refine_labeling(data, reference, estimator, threshold)?;
    debug!(
        "refinement: {} reference inliers, {} after refit",
        reference.inlier_count(),
        refined.inlier_count()
    );
    Ok(select_ground_truth(reference.clone(), refined))
}
