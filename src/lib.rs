//! # Inlier Bench - Evaluating Robust Two-View Estimators
//!
//! `inlier_bench` scores robust estimators of homographies, fundamental
//! matrices and essential matrices on annotated correspondence datasets.
//! Every scene goes through the same pipeline:
//!
//! 1. load correspondences and the manual inlier labeling ([`dataset`]),
//! 2. for calibrated scenes, move points and thresholds into normalized
//!    camera units ([`normalization`]),
//! 3. refit a model on the manual inliers and relabel every point to get a
//!    more complete ground truth ([`refinement`]),
//! 4. run each engine under test ([`magsac`], through [`core::RobustEstimator`]),
//! 5. report RMSE over the ground truth, inlier counts and iteration counts
//!    ([`metrics`], [`harness`]), and optionally render the matches
//!    ([`visualization`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use inlier_bench::dataset::{Labeling, SceneKind};
//! use inlier_bench::estimators::HomographyEstimator;
//! use inlier_bench::harness::{
//!     evaluate_scene, Contender, EvaluationSettings, PreparedScene, SceneProtocol,
//! };
//! use inlier_bench::magsac::Magsac;
//! use inlier_bench::samplers::UniformRandomSampler;
//! use inlier_bench::types::DataMatrix;
//!
//! // A pure translation by (5, -3).
//! let mut data = DataMatrix::zeros(20, 4);
//! for i in 0..20 {
//!     let (x, y) = ((i % 5) as f64 * 30.0, (i / 5) as f64 * 25.0 + (i as f64).sin());
//!     data[(i, 0)] = x;
//!     data[(i, 1)] = y;
//!     data[(i, 2)] = x + 5.0;
//!     data[(i, 3)] = y - 3.0;
//! }
//!
//! let protocol = SceneProtocol::for_kind(SceneKind::Homography);
//! let mut scene = PreparedScene::unlabeled("translation", data, &protocol);
//! scene.reference = Some(Labeling::new((0..20).map(|i| i < 8).collect()));
//!
//! let mut contenders = vec![Contender::new(
//!     "MAGSAC++",
//!     Magsac::default(),
//!     scene.thresholds.maximum,
//!     scene.thresholds.reference,
//! )];
//! let evaluation = evaluate_scene(
//!     &scene,
//!     &HomographyEstimator::new(),
//!     &mut contenders,
//!     || UniformRandomSampler::from_seed(7),
//!     &EvaluationSettings::default(),
//! )
//! .unwrap();
//! assert_eq!(evaluation.report.ground_truth_inliers, Some(20));
//! ```
//!
//! ## Extending the Benchmark
//!
//! The harness is generic over the pieces it evaluates:
//!
//! - **[`Estimator`](core::Estimator)**: a geometric model family (minimal and
//!   non-minimal fitting, residuals)
//! - **[`RobustEstimator`](core::RobustEstimator)**: the engine under test
//! - **[`Sampler`](core::Sampler)**: minimal sample selection
//! - **[`Scoring`](core::Scoring)** and
//!   **[`TerminationCriterion`](core::TerminationCriterion)**: building blocks
//!   of the bundled [`Magsac`](magsac::Magsac) engine
//! - **[`LocalOptimizer`](optimisers::LocalOptimizer)**: polishing of new best models
//! - **[`MatchRenderer`](visualization::MatchRenderer)**: where rendered
//!   matches go

pub mod core;
pub mod dataset;
pub mod estimators;
pub mod harness;
pub mod magsac;
pub mod metrics;
pub mod models;
pub mod normalization;
pub mod optimisers;
pub mod refinement;
pub mod samplers;
pub mod scoring;
pub mod settings;
pub mod types;
pub mod utils;
pub mod visualization;

// Re-export core traits for easy access
pub use core::{Estimator, RobustEstimator, Sampler, Scoring, TerminationCriterion};

// Re-export the common entry points
pub use harness::{run_benchmark, BenchmarkConfig};
pub use magsac::Magsac;
pub use settings::MagsacSettings;
