//! Robust estimation engine.
//!
//! [`Magsac`] is the sampling loop behind both benchmarked methods: with
//! [`ScoringType::MagsacPlusPlus`] it scores hypotheses by the marginalized
//! sigma-consensus++ loss and polishes them with IRLS, with
//! [`ScoringType::Ransac`] it is a plain inlier-counting RANSAC used as the
//! baseline.

use log::{debug, trace};

use crate::core::{
    Estimate, Estimator, RansacTerminationCriterion, RobustEstimator, Sampler, Scoring,
    TerminationCriterion,
};
use crate::optimisers::{IrlsOptimizer, LeastSquaresOptimizer, LocalOptimizer};
use crate::scoring::{InlierCountScoring, MagsacPlusPlusScoring, Score};
use crate::settings::{MagsacSettings, ScoringType};
use crate::types::DataMatrix;

/// Sample draws attempted per iteration before the iteration counts as empty.
const MAX_SAMPLE_ATTEMPTS: usize = 100;

/// Sample-consensus engine configured by [`MagsacSettings`].
#[derive(Debug, Clone)]
pub struct Magsac {
    settings: MagsacSettings,
}

impl Default for Magsac {
    fn default() -> Self {
        Self::new(MagsacSettings::default())
    }
}

struct Best<M> {
    model: M,
    score: Score,
    inliers: Vec<usize>,
}

impl Magsac {
    pub fn new(settings: MagsacSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MagsacSettings {
        &self.settings
    }

    fn run_with<E, S, Sc, LO>(
        &self,
        data: &DataMatrix,
        confidence: f64,
        estimator: &E,
        sampler: &mut S,
        scoring: &Sc,
        optimizer: &mut LO,
    ) -> Estimate<E::Model>
    where
        E: Estimator,
        S: Sampler,
        Sc: Scoring,
        LO: LocalOptimizer,
    {
        let sample_size = estimator.sample_size();
        if data.nrows() < sample_size {
            return Estimate::failed(0);
        }

        let mut sample = vec![0usize; sample_size];
        let mut scored_inliers = Vec::new();
        let mut termination = RansacTerminationCriterion { confidence };
        let mut max_iterations = self.settings.max_iterations;
        let min_iterations = self.settings.min_iterations.min(self.settings.max_iterations);
        let threshold = scoring.threshold();

        let mut best: Option<Best<E::Model>> = None;
        let mut iteration = 0;

        while iteration < max_iterations || iteration < min_iterations {
            iteration += 1;

            let mut models = Vec::new();
            for _ in 0..MAX_SAMPLE_ATTEMPTS {
                if !sampler.sample(data, sample_size, &mut sample) {
                    sampler.update(&sample, sample_size, iteration, 0.0);
                    continue;
                }
                if !estimator.is_valid_sample(data, &sample) {
                    sampler.update(&sample, sample_size, iteration, 0.0);
                    continue;
                }
                models = estimator.estimate_model(data, &sample);
                if models.is_empty() {
                    sampler.update(&sample, sample_size, iteration, 0.0);
                    continue;
                }
                break;
            }

            let mut improved = false;
            for model in models {
                if !estimator.is_valid_model(&model, data, &sample, threshold) {
                    continue;
                }
                let score = scoring.score(data, estimator, &model, &mut scored_inliers);
                if best.as_ref().map_or(true, |b| score > b.score) {
                    best = Some(Best {
                        model,
                        score,
                        inliers: scored_inliers.clone(),
                    });
                    improved = true;
                }
            }

            if improved {
                if let Some(current) = best.take() {
                    let (model, score, inliers) = optimizer.run(
                        data,
                        estimator,
                        scoring,
                        &current.model,
                        &current.score,
                        &current.inliers,
                    );
                    trace!(
                        "iteration {iteration}: new best score {:.4} with {} inliers",
                        score.value,
                        score.inlier_count
                    );
                    termination.check(data, &score, sample_size, &mut max_iterations);
                    best = Some(Best {
                        model,
                        score,
                        inliers,
                    });
                }
            }

            sampler.update(&sample, sample_size, iteration, 0.0);
        }

        let Some(current) = best else {
            debug!("no valid model after {iteration} iterations");
            return Estimate::failed(iteration);
        };

        // Final polish on the converged hypothesis.
        let (model, score, _) = optimizer.run(
            data,
            estimator,
            scoring,
            &current.model,
            &current.score,
            &current.inliers,
        );
        debug!(
            "{} finished after {iteration} iterations, {} inliers at the reference threshold",
            self.settings.scoring.name(),
            score.inlier_count
        );

        Estimate {
            model: Some(model),
            iterations: iteration,
            score: Some(score),
        }
    }
}

impl RobustEstimator for Magsac {
    fn set_maximum_threshold(&mut self, threshold: f64) {
        self.settings.maximum_threshold = threshold;
    }

    fn set_reference_threshold(&mut self, threshold: f64) {
        self.settings.reference_threshold = threshold;
    }

    fn set_iteration_limit(&mut self, limit: usize) {
        self.settings.max_iterations = limit;
    }

    fn run<E: Estimator, S: Sampler>(
        &mut self,
        data: &DataMatrix,
        confidence: f64,
        estimator: &E,
        sampler: &mut S,
    ) -> Estimate<E::Model> {
        match self.settings.scoring {
            ScoringType::MagsacPlusPlus => {
                let scoring = MagsacPlusPlusScoring::new(
                    self.settings.maximum_threshold,
                    self.settings.reference_threshold,
                );
                let mut optimizer = IrlsOptimizer::new(self.settings.polishing_iterations);
                self.run_with(data, confidence, estimator, sampler, &scoring, &mut optimizer)
            }
            ScoringType::Ransac => {
                let scoring = InlierCountScoring::new(self.settings.maximum_threshold);
                let mut optimizer = LeastSquaresOptimizer;
                self.run_with(data, confidence, estimator, sampler, &scoring, &mut optimizer)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::HomographyEstimator;
    use crate::samplers::UniformRandomSampler;
    use nalgebra::{Matrix3, Vector3};

    /// 60 correspondences of a projective map, the first `inliers` exact and
    /// the rest scattered far off.
    fn homography_scene(inliers: usize) -> (DataMatrix, Matrix3<f64>) {
        let h = Matrix3::new(0.9, 0.1, 20.0, -0.05, 1.05, 8.0, 2e-4, 1e-4, 1.0);
        let mut data = DataMatrix::zeros(60, 4);
        for i in 0..60 {
            let x = (i % 10) as f64 * 35.0 + ((i * 7) as f64).sin() * 5.0;
            let y = (i / 10) as f64 * 45.0 + ((i * 3) as f64).cos() * 5.0;
            let p = h * Vector3::new(x, y, 1.0);
            data[(i, 0)] = x;
            data[(i, 1)] = y;
            if i < inliers {
                data[(i, 2)] = p.x / p.z;
                data[(i, 3)] = p.y / p.z;
            } else {
                data[(i, 2)] = ((i * 31) % 97) as f64 * 4.0;
                data[(i, 3)] = ((i * 17) % 89) as f64 * 4.0 + 50.0;
            }
        }
        (data, h)
    }

    #[test]
    fn magsac_finds_homography_among_outliers() {
        let (data, _) = homography_scene(40);
        let mut engine = Magsac::default();
        engine.set_maximum_threshold(10.0);
        engine.set_reference_threshold(2.0);
        let estimator = HomographyEstimator::new();
        let mut sampler = UniformRandomSampler::from_seed(5);

        let estimate = engine.run(&data, 0.99, &estimator, &mut sampler);
        assert!(estimate.succeeded());
        assert!(estimate.iterations >= engine.settings().min_iterations);
        assert!(estimate.iterations < 10_000, "adaptive bound should stop early");

        let model = estimate.model.expect("model");
        let mask = engine.inlier_mask(&data, &model, &estimator, 1.0);
        assert!(mask[..40].iter().all(|&m| m));
        assert!(mask.iter().filter(|&&m| m).count() <= 45);
    }

    #[test]
    fn ransac_baseline_finds_the_same_support() {
        let (data, _) = homography_scene(45);
        let mut engine = Magsac::new(MagsacSettings::ransac(1.0));
        let estimator = HomographyEstimator::new();
        let mut sampler = UniformRandomSampler::from_seed(9);

        let estimate = engine.run(&data, 0.99, &estimator, &mut sampler);
        let score = estimate.score.expect("score");
        assert!(score.inlier_count >= 45);
    }

    #[test]
    fn iteration_limit_is_a_hard_cap() {
        let (data, _) = homography_scene(60);
        let mut settings = MagsacSettings::default();
        settings.min_iterations = 500;
        let mut engine = Magsac::new(settings);
        engine.set_iteration_limit(20);

        let estimate = engine.run(
            &data,
            0.99,
            &HomographyEstimator::new(),
            &mut UniformRandomSampler::from_seed(1),
        );
        assert!(estimate.iterations <= 20);
    }

    #[test]
    fn too_few_points_fail_without_iterating() {
        let data = DataMatrix::zeros(3, 4);
        let mut engine = Magsac::default();
        let estimate = engine.run(
            &data,
            0.99,
            &HomographyEstimator::new(),
            &mut UniformRandomSampler::from_seed(1),
        );
        assert!(!estimate.succeeded());
        assert_eq!(estimate.iterations, 0);
    }
}
