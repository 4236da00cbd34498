//! Estimators for the three two-view model families.
//!
//! - Homography estimation (planar scenes)
//! - Fundamental matrix estimation (uncalibrated views)
//! - Essential matrix estimation (calibrated views, normalized coordinates)

pub mod essential;
pub mod fundamental;
pub mod homography;

pub use essential::EssentialEstimator;
pub use fundamental::FundamentalEstimator;
pub use homography::HomographyEstimator;

#[cfg(test)]
mod tests {
    use super::{EssentialEstimator, FundamentalEstimator, HomographyEstimator};
    use crate::core::Estimator;
    use crate::types::DataMatrix;

    #[test]
    fn minimal_sample_sizes() {
        assert_eq!(HomographyEstimator::new().sample_size(), 4);
        assert_eq!(FundamentalEstimator::new().sample_size(), 7);
        assert_eq!(FundamentalEstimator::new().non_minimal_sample_size(), 8);
        assert_eq!(EssentialEstimator::new().sample_size(), 8);
    }

    #[test]
    fn homography_estimator_recovers_simple_translation() {
        let tx = 1.0;
        let ty = 2.0;
        let correspondences = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];

        let mut data = DataMatrix::zeros(4, 4);
        for (i, (x, y)) in correspondences.iter().enumerate() {
            data[(i, 0)] = *x;
            data[(i, 1)] = *y;
            data[(i, 2)] = x + tx;
            data[(i, 3)] = y + ty;
        }

        let estimator = HomographyEstimator::new();
        let sample = [0usize, 1, 2, 3];
        assert!(estimator.is_valid_sample(&data, &sample));

        let models = estimator.estimate_model(&data, &sample);
        assert_eq!(models.len(), 1);
        for row in 0..4 {
            assert!(estimator.residual(&data, row, &models[0]) < 1e-9);
        }
    }

    #[test]
    fn duplicate_indices_are_invalid_samples() {
        let data = DataMatrix::zeros(10, 4);
        let sample = [0usize, 1, 2, 3, 4, 5, 5, 6];
        assert!(!FundamentalEstimator::new().is_valid_sample(&data, &sample[..7]));
        assert!(!EssentialEstimator::new().is_valid_sample(&data, &sample));
    }
}
