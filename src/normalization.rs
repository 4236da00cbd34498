//! Removal of camera intrinsics from calibrated scenes.
//!
//! Correspondences are mapped through `K^-1` into normalized camera
//! coordinates, and pixel thresholds are divided by the mean focal length of
//! the two cameras. Thresholds carry their unit in the type: a
//! [`PixelThreshold`] can only become a [`NormalizedThreshold`] through a
//! [`FocalNormalizer`], and a normalized value cannot be normalized again.

use nalgebra::{Matrix3, Vector3};
use serde::Serialize;
use thiserror::Error;

use crate::types::DataMatrix;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizationError {
    #[error("{which} intrinsics matrix is not invertible")]
    SingularIntrinsics { which: &'static str },

    #[error("mean focal length must be positive and finite, got {0}")]
    InvalidFocalLength(f64),

    #[error("correspondence matrix has {0} columns, expected at least 4")]
    BadShape(usize),
}

/// Scalar distance threshold in some coordinate frame.
pub trait Threshold: Copy + std::fmt::Debug {
    /// Raw value handed to the engine and metrics, in the frame of the data.
    fn value(&self) -> f64;
}

/// Threshold in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct PixelThreshold(pub f64);

/// Threshold in normalized camera units. Only [`FocalNormalizer`] creates these.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct NormalizedThreshold(f64);

impl Threshold for PixelThreshold {
    fn value(&self) -> f64 {
        self.0
    }
}

impl Threshold for NormalizedThreshold {
    fn value(&self) -> f64 {
        self.0
    }
}

/// The three independent threshold roles of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdRoles<T> {
    /// Upper bound on the noise scale inside the engine.
    pub maximum: T,
    /// Inlier threshold the engine uses internally for its stopping bound.
    pub reference: T,
    /// Threshold of the final inlier count and the rendered matches.
    pub reporting: T,
}

impl<T> ThresholdRoles<T> {
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> ThresholdRoles<U> {
        ThresholdRoles {
            maximum: f(self.maximum),
            reference: f(self.reference),
            reporting: f(self.reporting),
        }
    }
}

/// Calibration of the source and destination cameras.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrinsicsPair {
    pub source: Matrix3<f64>,
    pub destination: Matrix3<f64>,
}

impl IntrinsicsPair {
    pub fn new(source: Matrix3<f64>, destination: Matrix3<f64>) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Mean of `K1[0,0]`, `K1[1,1]`, `K2[0,0]` and `K2[1,1]`.
    pub fn mean_focal_length(&self) -> f64 {
        (self.source[(0, 0)]
            + self.source[(1, 1)]
            + self.destination[(0, 0)]
            + self.destination[(1, 1)])
            / 4.0
    }
}

/// Converts pixel thresholds by the mean focal length of an intrinsics pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalNormalizer {
    mean_focal_length: f64,
}

impl FocalNormalizer {
    pub fn new(intrinsics: &IntrinsicsPair) -> Result<Self, NormalizationError> {
        Self::from_focal_length(intrinsics.mean_focal_length())
    }

    pub fn from_focal_length(mean_focal_length: f64) -> Result<Self, NormalizationError> {
        if !mean_focal_length.is_finite() || mean_focal_length <= 0.0 {
            return Err(NormalizationError::InvalidFocalLength(mean_focal_length));
        }
        Ok(Self { mean_focal_length })
    }

    pub fn mean_focal_length(&self) -> f64 {
        self.mean_focal_length
    }

    pub fn normalize(&self, threshold: PixelThreshold) -> NormalizedThreshold {
        NormalizedThreshold(threshold.0 / self.mean_focal_length)
    }

    /// Normalize every role by the same focal length.
    pub fn normalize_roles(
        &self,
        roles: ThresholdRoles<PixelThreshold>,
    ) -> ThresholdRoles<NormalizedThreshold> {
        roles.map(|t| self.normalize(t))
    }
}

fn to_camera(k_inv: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let p = k_inv * Vector3::new(x, y, 1.0);
    (p.x / p.z, p.y / p.z)
}

/// Map pixel correspondences into normalized camera coordinates.
///
/// Columns 0-1 go through `K1^-1`, columns 2-3 through `K2^-1`; any further
/// columns are dropped.
pub fn normalize_correspondences(
    data: &DataMatrix,
    intrinsics: &IntrinsicsPair,
) -> Result<DataMatrix, NormalizationError> {
    if data.ncols() < 4 {
        return Err(NormalizationError::BadShape(data.ncols()));
    }
    let k1_inv = intrinsics
        .source
        .try_inverse()
        .ok_or(NormalizationError::SingularIntrinsics { which: "source" })?;
    let k2_inv = intrinsics
        .destination
        .try_inverse()
        .ok_or(NormalizationError::SingularIntrinsics {
            which: "destination",
        })?;

    let mut normalized = DataMatrix::zeros(data.nrows(), 4);
    for row in 0..data.nrows() {
        let (x1, y1) = to_camera(&k1_inv, data[(row, 0)], data[(row, 1)]);
        let (x2, y2) = to_camera(&k2_inv, data[(row, 2)], data[(row, 3)]);
        normalized[(row, 0)] = x1;
        normalized[(row, 1)] = y1;
        normalized[(row, 2)] = x2;
        normalized[(row, 3)] = y2;
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn intrinsics(f: f64) -> IntrinsicsPair {
        let k = Matrix3::new(f, 0.0, 500.0, 0.0, f, 400.0, 0.0, 0.0, 1.0);
        IntrinsicsPair::new(k, k)
    }

    #[test]
    fn threshold_is_divided_by_mean_focal_length() {
        let normalizer = FocalNormalizer::new(&intrinsics(1000.0)).unwrap();
        assert_relative_eq!(normalizer.normalize(PixelThreshold(3.0)).value(), 0.003);
        assert_relative_eq!(normalizer.normalize(PixelThreshold(5.0)).value(), 0.005);
    }

    #[test]
    fn mean_focal_length_uses_all_four_entries() {
        let k1 = Matrix3::new(900.0, 0.0, 0.0, 0.0, 1100.0, 0.0, 0.0, 0.0, 1.0);
        let k2 = Matrix3::new(800.0, 0.0, 0.0, 0.0, 1200.0, 0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(IntrinsicsPair::new(k1, k2).mean_focal_length(), 1000.0);
    }

    #[test]
    fn roles_are_normalized_independently() {
        let normalizer = FocalNormalizer::from_focal_length(500.0).unwrap();
        let roles = normalizer.normalize_roles(ThresholdRoles {
            maximum: PixelThreshold(5.0),
            reference: PixelThreshold(2.0),
            reporting: PixelThreshold(3.0),
        });
        assert_relative_eq!(roles.maximum.value(), 0.01);
        assert_relative_eq!(roles.reference.value(), 0.004);
        assert_relative_eq!(roles.reporting.value(), 0.006);
    }

    #[test]
    fn double_normalization_is_distinguishable() {
        let normalizer = FocalNormalizer::from_focal_length(1000.0).unwrap();
        let once = normalizer.normalize(PixelThreshold(3.0));
        // Re-normalizing requires going back through a raw pixel value explicitly.
        let twice = normalizer.normalize(PixelThreshold(once.value()));
        assert!((once.value() - twice.value()).abs() > 1e-6);
    }

    #[test]
    fn invalid_focal_lengths_are_rejected() {
        assert_eq!(
            FocalNormalizer::from_focal_length(0.0),
            Err(NormalizationError::InvalidFocalLength(0.0))
        );
        assert!(FocalNormalizer::from_focal_length(f64::NAN).is_err());
    }

    #[test]
    fn principal_point_maps_to_origin() {
        let data = DataMatrix::from_row_slice(
            2,
            5,
            &[500.0, 400.0, 1500.0, 400.0, 1.0, 600.0, 300.0, 500.0, 400.0, 0.0],
        );
        let normalized = normalize_correspondences(&data, &intrinsics(1000.0)).unwrap();
        assert_eq!(normalized.ncols(), 4);
        assert_relative_eq!(normalized[(0, 0)], 0.0);
        assert_relative_eq!(normalized[(0, 2)], 1.0);
        assert_relative_eq!(normalized[(1, 0)], 0.1);
        assert_relative_eq!(normalized[(1, 1)], -0.1);
    }

    #[test]
    fn singular_intrinsics_are_reported() {
        let mut pair = intrinsics(1000.0);
        pair.destination = Matrix3::zeros();
        let data = DataMatrix::zeros(1, 4);
        assert_eq!(
            normalize_correspondences(&data, &pair),
            Err(NormalizationError::SingularIntrinsics {
                which: "destination"
            })
        );
    }
}
