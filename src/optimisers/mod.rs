use crate::core::{Estimator, Scoring};
use crate::scoring::Score;
use crate::types::DataMatrix;

/// Local optimization strategy, polishing a model using its inliers.
///
/// Once the sampling loop finds a new best hypothesis, local optimization
/// re-estimates it from all correspondences supporting it. Implementations
/// only return a different model when it scores strictly better under
/// `scoring`.
///
/// ## Example: custom refinement
///
/// ```rust
/// use inlier_bench::core::{Estimator, Scoring};
/// use inlier_bench::optimisers::LocalOptimizer;
/// use inlier_bench::scoring::Score;
/// use inlier_bench::types::DataMatrix;
///
/// struct KeepAsIs;
///
/// impl LocalOptimizer for KeepAsIs {
///     fn run<E: Estimator, Sc: Scoring>(
///         &mut self,
///         _data: &DataMatrix,
///         _estimator: &E,
///         _scoring: &Sc,
///         model: &E::Model,
///         score: &Score,
///         inliers: &[usize],
///     ) -> (E::Model, Score, Vec<usize>) {
///         (model.clone(), score.clone(), inliers.to_vec())
///     }
/// }
/// ```
pub trait LocalOptimizer {
    /// Run local optimization on the current model and inliers.
    fn run<E: Estimator, Sc: Scoring>(
        &mut self,
        data: &DataMatrix,
        estimator: &E,
        scoring: &Sc,
        model: &E::Model,
        score: &Score,
        inliers: &[usize],
    ) -> (E::Model, Score, Vec<usize>);
}

/// Concrete optimizer implementations.
pub mod local;

pub use local::{IrlsOptimizer, LeastSquaresOptimizer};
