//! Geometric models produced by the two-view estimators.

use nalgebra::Matrix3;

/// Common view over the 3x3 matrix every two-view model wraps.
pub trait TwoViewModel {
    fn matrix(&self) -> Matrix3<f64>;

    /// Row-major copy of the matrix, the layout used in reports.
    fn rows(&self) -> [[f64; 3]; 3] {
        let m = self.matrix();
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }
}

/// Planar projective transformation represented by a 3x3 matrix.
#[derive(Clone, Debug)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }
}

/// Fundamental matrix relating two uncalibrated pinhole views.
#[derive(Clone, Debug)]
pub struct FundamentalMatrix {
    pub f: Matrix3<f64>,
}

impl FundamentalMatrix {
    pub fn new(f: Matrix3<f64>) -> Self {
        Self { f }
    }
}

/// Essential matrix relating two calibrated views.
///
/// Expressed in normalized camera coordinates, i.e. after the intrinsics of
/// both views have been removed from the correspondences.
#[derive(Clone, Debug)]
pub struct EssentialMatrix {
    pub e: Matrix3<f64>,
}

impl EssentialMatrix {
    pub fn new(e: Matrix3<f64>) -> Self {
        Self { e }
    }
}

impl TwoViewModel for Homography {
    fn matrix(&self) -> Matrix3<f64> {
        self.h
    }
}

impl TwoViewModel for FundamentalMatrix {
    fn matrix(&self) -> Matrix3<f64> {
        self.f
    }
}

impl TwoViewModel for EssentialMatrix {
    fn matrix(&self) -> Matrix3<f64> {
        self.e
    }
}
