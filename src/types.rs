//! Core shared types for the benchmark harness.
//!
//! Correspondences are stored one per row as `x1 y1 x2 y2`, the layout every
//! estimator, sampler and metric in this crate indexes into.

use nalgebra::DMatrix;

/// Dynamic row-per-correspondence matrix of `f64`.
pub type DataMatrix = DMatrix<f64>;

/// Number of columns of a correspondence row (`x1 y1 x2 y2`).
pub const CORRESPONDENCE_COLS: usize = 4;
