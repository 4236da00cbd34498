//! Benchmark protocol and runner.
//!
//! One scene goes through: load, optional normalization, ground-truth
//! refinement, one engine run per contender (the RANSAC baseline, then
//! MAGSAC++), metrics, optional rendering. Every failure stays inside its
//! scene; [`run_benchmark`] logs it and moves on.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Estimator, RobustEstimator, Sampler};
use crate::dataset::{
    self, AnnotatedCorrespondences, Dataset, DatasetError, ImagePair, Labeling, SceneKind,
    ScenePaths,
};
use crate::estimators::{EssentialEstimator, FundamentalEstimator, HomographyEstimator};
use crate::magsac::Magsac;
use crate::metrics::{self, Rmse};
use crate::models::TwoViewModel;
use crate::normalization::{
    normalize_correspondences, FocalNormalizer, IntrinsicsPair, NormalizationError,
    NormalizedThreshold, PixelThreshold, Threshold, ThresholdRoles,
};
use crate::refinement::{self, GroundTruth, GroundTruthSource, RefinementError};
use crate::samplers::UniformRandomSampler;
use crate::settings::{MagsacSettings, ScoringType};
use crate::types::DataMatrix;
use crate::visualization::{self, MatchDrawing, MatchRenderer};

/// Everything that can end the evaluation of a single scene.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("ground-truth refinement failed: {0}")]
    Refinement(#[from] RefinementError),

    #[error("scene \"{0}\" has no correspondences")]
    EmptyData(String),
}

/// Reading a configuration file or writing a report.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-family thresholds, all in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SceneProtocol {
    pub kind: SceneKind,
    pub thresholds: ThresholdRoles<PixelThreshold>,
    /// Relabeling threshold of the ground-truth refinement, `None` when the
    /// family has no reference labels.
    pub refinement_threshold: Option<PixelThreshold>,
    /// Inlier threshold of the RANSAC baseline.
    pub baseline_threshold: PixelThreshold,
}

impl SceneProtocol {
    pub fn for_kind(kind: SceneKind) -> Self {
        let roles = |maximum, reference, reporting| ThresholdRoles {
            maximum: PixelThreshold(maximum),
            reference: PixelThreshold(reference),
            reporting: PixelThreshold(reporting),
        };
        match kind {
            SceneKind::Homography => Self {
                kind,
                thresholds: roles(50.0, 2.0, 2.5),
                refinement_threshold: Some(PixelThreshold(2.0)),
                baseline_threshold: PixelThreshold(1.0),
            },
            SceneKind::FundamentalMatrix => Self {
                kind,
                thresholds: roles(5.0, 2.0, 1.0),
                refinement_threshold: Some(PixelThreshold(0.35)),
                baseline_threshold: PixelThreshold(1.0),
            },
            SceneKind::EssentialMatrix => Self {
                kind,
                thresholds: roles(5.0, 2.0, 3.0),
                refinement_threshold: None,
                baseline_threshold: PixelThreshold(3.0),
            },
        }
    }
}

/// A scene ready for evaluation, with every threshold in the units of `data`.
#[derive(Debug, Clone)]
pub struct PreparedScene<T> {
    pub name: String,
    pub kind: SceneKind,
    /// Correspondences handed to the engine and the metrics.
    pub data: DataMatrix,
    /// Pixel coordinates of the same correspondences, for rendering.
    pub display_points: DataMatrix,
    pub reference: Option<Labeling>,
    pub thresholds: ThresholdRoles<T>,
    pub refinement_threshold: Option<T>,
    pub baseline_threshold: T,
}

impl PreparedScene<PixelThreshold> {
    /// Uncalibrated scene with a manual labeling.
    pub fn labeled(
        name: impl Into<String>,
        annotated: AnnotatedCorrespondences,
        protocol: &SceneProtocol,
    ) -> Self {
        let mut scene = Self::unlabeled(name, annotated.points, protocol);
        scene.reference = Some(annotated.labels);
        scene
    }

    pub fn unlabeled(name: impl Into<String>, data: DataMatrix, protocol: &SceneProtocol) -> Self {
        Self {
            name: name.into(),
            kind: protocol.kind,
            display_points: data.clone(),
            data,
            reference: None,
            thresholds: protocol.thresholds,
            refinement_threshold: protocol.refinement_threshold,
            baseline_threshold: protocol.baseline_threshold,
        }
    }
}

impl PreparedScene<NormalizedThreshold> {
    /// Calibrated scene: correspondences go through `K^-1` and every
    /// threshold is divided by the mean focal length, once.
    pub fn calibrated(
        name: impl Into<String>,
        points: DataMatrix,
        intrinsics: &IntrinsicsPair,
        protocol: &SceneProtocol,
    ) -> Result<Self, NormalizationError> {
        let normalizer = FocalNormalizer::new(intrinsics)?;
        let data = normalize_correspondences(&points, intrinsics)?;
        debug!(
            "normalized with mean focal length {:.3}",
            normalizer.mean_focal_length()
        );
        Ok(Self {
            name: name.into(),
            kind: protocol.kind,
            data,
            display_points: points,
            reference: None,
            thresholds: normalizer.normalize_roles(protocol.thresholds),
            refinement_threshold: protocol.refinement_threshold.map(|t| normalizer.normalize(t)),
            baseline_threshold: normalizer.normalize(protocol.baseline_threshold),
        })
    }
}

/// A named engine together with the thresholds it runs at.
pub struct Contender<R, T> {
    pub name: String,
    pub engine: R,
    pub maximum: T,
    pub reference: T,
    /// Threshold of the reported inlier count and mask, the scene's
    /// reporting threshold when `None`.
    pub reporting: Option<T>,
}

impl<R: RobustEstimator, T: Threshold> Contender<R, T> {
    pub fn new(name: impl Into<String>, engine: R, maximum: T, reference: T) -> Self {
        Self {
            name: name.into(),
            engine,
            maximum,
            reference,
            reporting: None,
        }
    }

    pub fn reporting_at(mut self, threshold: T) -> Self {
        self.reporting = Some(threshold);
        self
    }

    fn reporting_threshold(&self, scene: &PreparedScene<T>) -> T {
        self.reporting.unwrap_or(scene.thresholds.reporting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationSettings {
    pub confidence: f64,
    pub iteration_limit: usize,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            confidence: 0.99,
            iteration_limit: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodMetrics {
    pub iterations: usize,
    /// Closed-form iteration bound at the ground-truth inlier ratio.
    pub theoretical_iterations: Option<f64>,
    pub elapsed_secs: f64,
    /// `None` when the scene has no ground truth.
    pub rmse: Option<Rmse>,
    pub reporting_threshold: f64,
    pub inliers: usize,
    /// Estimated matrix, row-major.
    pub model: [[f64; 3]; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SceneOutcome {
    NoModel { iterations: usize },
    Estimated(MethodMetrics),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodReport {
    pub method: String,
    pub outcome: SceneOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    pub scene: String,
    pub kind: SceneKind,
    pub correspondences: usize,
    pub ground_truth_inliers: Option<usize>,
    pub ground_truth_source: Option<GroundTruthSource>,
    pub methods: Vec<MethodReport>,
}

/// Report plus the models behind it, parallel to the contenders.
#[derive(Debug, Clone)]
pub struct SceneEvaluation<M> {
    pub report: SceneReport,
    pub models: Vec<Option<M>>,
}

/// The refined labeling where the scene has a refinement threshold, the
/// manual one where it only has labels, nothing otherwise.
pub fn establish_ground_truth<E: Estimator, T: Threshold>(
    scene: &PreparedScene<T>,
    estimator: &E,
) -> Result<Option<GroundTruth>, RefinementError> {
    let Some(reference) = &scene.reference else {
        return Ok(None);
    };
    match scene.refinement_threshold {
        Some(threshold) => {
            refinement::derive_ground_truth(&scene.data, reference, estimator, threshold).map(Some)
        }
        None => Ok(Some(GroundTruth {
            labeling: reference.clone(),
            source: GroundTruthSource::Reference,
        })),
    }
}

/// Configure and run one contender, then score its model.
pub fn run_contender<E, R, S, T>(
    scene: &PreparedScene<T>,
    ground_truth: Option<&GroundTruth>,
    contender: &mut Contender<R, T>,
    estimator: &E,
    sampler: &mut S,
    settings: &EvaluationSettings,
) -> (MethodReport, Option<E::Model>)
where
    E: Estimator,
    E::Model: TwoViewModel,
    R: RobustEstimator,
    S: Sampler,
    T: Threshold,
{
    let name = contender.name.clone();
    let engine = &mut contender.engine;
    engine.set_maximum_threshold(contender.maximum.value());
    engine.set_reference_threshold(contender.reference.value());
    engine.set_iteration_limit(settings.iteration_limit);

    let theoretical_iterations = ground_truth.and_then(|gt| {
        metrics::theoretical_iteration_count(
            settings.confidence,
            gt.inlier_count() as f64 / scene.data.nrows() as f64,
            estimator.sample_size(),
        )
    });
    match theoretical_iterations {
        Some(n) => info!(
            "{name}: Theoretical RANSAC iteration number at {:.2} confidence: {n:.0}",
            settings.confidence
        ),
        None => info!(
            "{name}: Theoretical RANSAC iteration number at {:.2} confidence: undefined",
            settings.confidence
        ),
    }

    let start = Instant::now();
    let estimate = engine.run(&scene.data, settings.confidence, estimator, sampler);
    let elapsed_secs = start.elapsed().as_secs_f64();
    info!(
        "{name}: Actual number of iterations drawn: {}",
        estimate.iterations
    );
    info!("{name}: Elapsed time: {elapsed_secs:.6} secs");

    let Some(model) = estimate.model else {
        warn!("{name}: No reasonable model has been found.");
        let report = MethodReport {
            method: name,
            outcome: SceneOutcome::NoModel {
                iterations: estimate.iterations,
            },
        };
        return (report, None);
    };

    let rmse = ground_truth
        .map(|gt| metrics::compute_rmse(&scene.data, &gt.labeling, &model, estimator));
    match rmse {
        Some(rmse) => info!("{name}: RMSE error: {rmse} px"),
        None => info!("{name}: RMSE error: undefined (no ground truth)"),
    }

    let reporting_threshold = contender.reporting_threshold(scene).value();
    let inliers = metrics::inlier_count(&scene.data, &model, estimator, reporting_threshold);
    info!("{name}: Number of inliers for threshold {reporting_threshold}: {inliers}");
    debug!("{name}: model {:?}", model.rows());

    let report = MethodReport {
        method: name,
        outcome: SceneOutcome::Estimated(MethodMetrics {
            iterations: estimate.iterations,
            theoretical_iterations,
            elapsed_secs,
            rmse,
            reporting_threshold,
            inliers,
            model: model.rows(),
        }),
    };
    (report, Some(model))
}

/// Ground truth once, then every contender in order. Each contender draws
/// from its own sampler, so its samples do not depend on who ran before it.
pub fn evaluate_scene<E, R, S, F, T>(
    scene: &PreparedScene<T>,
    estimator: &E,
    contenders: &mut [Contender<R, T>],
    mut make_sampler: F,
    settings: &EvaluationSettings,
) -> Result<SceneEvaluation<E::Model>, SceneError>
where
    E: Estimator,
    E::Model: TwoViewModel,
    R: RobustEstimator,
    S: Sampler,
    F: FnMut() -> S,
    T: Threshold,
{
    let correspondences = scene.data.nrows();
    if correspondences == 0 {
        return Err(SceneError::EmptyData(scene.name.clone()));
    }
    info!("Loaded {correspondences} correspondences.");

    let ground_truth = establish_ground_truth(scene, estimator)?;
    if let Some(gt) = &ground_truth {
        info!(
            "Ground truth inliers: {} of {correspondences} ({:?} labeling)",
            gt.inlier_count(),
            gt.source
        );
    }

    let mut methods = Vec::with_capacity(contenders.len());
    let mut models = Vec::with_capacity(contenders.len());
    for contender in contenders.iter_mut() {
        let mut sampler = make_sampler();
        let (report, model) = run_contender(
            scene,
            ground_truth.as_ref(),
            contender,
            estimator,
            &mut sampler,
            settings,
        );
        methods.push(report);
        models.push(model);
    }

    Ok(SceneEvaluation {
        report: SceneReport {
            dataset: None,
            scene: scene.name.clone(),
            kind: scene.kind,
            correspondences,
            ground_truth_inliers: ground_truth.as_ref().map(GroundTruth::inlier_count),
            ground_truth_source: ground_truth.as_ref().map(|gt| gt.source),
            methods,
        },
        models,
    })
}

/// Run-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub data_root: PathBuf,
    pub confidence: f64,
    pub datasets: Vec<Dataset>,
    /// Run the RANSAC baseline before MAGSAC++ on every scene.
    pub run_baseline: bool,
    pub draw: bool,
    pub output_dir: PathBuf,
    /// Block after each rendered scene until Enter is pressed.
    pub wait_for_key: bool,
    /// JSON summary destination.
    pub report: Option<PathBuf>,
    /// Engine settings shared by the baseline and MAGSAC++.
    pub engine: EngineConfig,
}

/// Engine knobs a run may override. Thresholds are not among them: each
/// family's protocol fixes those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub min_iterations: usize,
    pub max_iterations: usize,
    pub polishing_iterations: usize,
    pub random_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let settings = MagsacSettings::default();
        Self {
            min_iterations: settings.min_iterations,
            max_iterations: settings.max_iterations,
            polishing_iterations: settings.polishing_iterations,
            random_seed: settings.random_seed,
        }
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            confidence: 0.99,
            datasets: Dataset::ALL.to_vec(),
            run_baseline: true,
            draw: false,
            output_dir: PathBuf::from("results"),
            wait_for_key: false,
            report: None,
            engine: EngineConfig::default(),
        }
    }
}

impl BenchmarkConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, RunnerError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunnerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| RunnerError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn evaluation_settings(&self) -> EvaluationSettings {
        EvaluationSettings {
            confidence: self.confidence,
            iteration_limit: self.engine.max_iterations,
        }
    }

    /// MAGSAC++ settings; the harness sets the thresholds per scene.
    pub fn magsac_settings(&self) -> MagsacSettings {
        MagsacSettings {
            min_iterations: self.engine.min_iterations,
            max_iterations: self.engine.max_iterations,
            polishing_iterations: self.engine.polishing_iterations,
            random_seed: self.engine.random_seed,
            scoring: ScoringType::MagsacPlusPlus,
            ..MagsacSettings::default()
        }
    }

    pub fn baseline_settings(&self, threshold: f64) -> MagsacSettings {
        MagsacSettings {
            max_iterations: self.engine.max_iterations,
            random_seed: self.engine.random_seed,
            ..MagsacSettings::ransac(threshold)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneFailure {
    pub dataset: String,
    pub scene: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    pub reports: Vec<SceneReport>,
    pub failures: Vec<SceneFailure>,
}

impl BenchmarkSummary {
    pub fn write_json(&self, path: &Path) -> Result<(), RunnerError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| RunnerError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| RunnerError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn no_model_count(&self) -> usize {
        self.reports
            .iter()
            .flat_map(|r| &r.methods)
            .filter(|m| matches!(m.outcome, SceneOutcome::NoModel { .. }))
            .count()
    }
}

/// Labeled homography or fundamental matrix scene from disk.
pub fn load_labeled_scene(
    paths: &ScenePaths,
    protocol: &SceneProtocol,
) -> Result<PreparedScene<PixelThreshold>, SceneError> {
    let annotated = dataset::read_annotated_points(&paths.points)?;
    Ok(PreparedScene::labeled(
        paths.scene.clone(),
        annotated,
        protocol,
    ))
}

/// Essential matrix scene from disk, normalized.
pub fn load_calibrated_scene(
    paths: &ScenePaths,
    protocol: &SceneProtocol,
) -> Result<PreparedScene<NormalizedThreshold>, SceneError> {
    let points = dataset::read_points(&paths.points)?;
    let intrinsics = IntrinsicsPair::new(
        dataset::read_intrinsics(&paths.source_intrinsics)?,
        dataset::read_intrinsics(&paths.destination_intrinsics)?,
    );
    Ok(PreparedScene::calibrated(
        paths.scene.clone(),
        points,
        &intrinsics,
        protocol,
    )?)
}

fn evaluate_and_render<E, T>(
    config: &BenchmarkConfig,
    scene: &PreparedScene<T>,
    estimator: &E,
    images: Option<&ImagePair>,
    renderer: Option<&mut dyn MatchRenderer>,
) -> Result<SceneReport, SceneError>
where
    E: Estimator,
    E::Model: TwoViewModel,
    T: Threshold,
{
    let mut contenders = Vec::with_capacity(2);
    if config.run_baseline {
        contenders.push(
            Contender::new(
                ScoringType::Ransac.name(),
                Magsac::new(config.baseline_settings(scene.baseline_threshold.value())),
                scene.baseline_threshold,
                scene.baseline_threshold,
            )
            .reporting_at(scene.baseline_threshold),
        );
    }
    contenders.push(Contender::new(
        ScoringType::MagsacPlusPlus.name(),
        Magsac::new(config.magsac_settings()),
        scene.thresholds.maximum,
        scene.thresholds.reference,
    ));

    let seed = config.engine.random_seed;
    let evaluation = evaluate_scene(
        scene,
        estimator,
        &mut contenders,
        || UniformRandomSampler::with_seed(seed),
        &config.evaluation_settings(),
    )?;

    if let (Some(images), Some(renderer)) = (images, renderer) {
        for (contender, model) in contenders.iter().zip(&evaluation.models) {
            let Some(model) = model else {
                continue;
            };
            let labels = contender.engine.inlier_mask(
                &scene.data,
                model,
                estimator,
                contender.reporting_threshold(scene).value(),
            );
            let drawing = MatchDrawing {
                scene: &scene.name,
                method: &contender.name,
                images,
                points: &scene.display_points,
                labels: &labels,
            };
            if let Err(err) = renderer.render(&drawing) {
                warn!("Could not render matches of {}: {err}", contender.name);
            }
        }
        if config.wait_for_key {
            if let Err(err) = visualization::wait_for_acknowledgement() {
                warn!("Could not wait for acknowledgement: {err}");
            }
        }
    }

    Ok(evaluation.report)
}

fn run_scene<E>(
    config: &BenchmarkConfig,
    dataset: Dataset,
    scene: &str,
    estimator: &E,
    renderer: Option<&mut dyn MatchRenderer>,
) -> Result<SceneReport, SceneError>
where
    E: Estimator,
    E::Model: TwoViewModel,
{
    let kind = dataset.kind();
    let paths = ScenePaths::new(&config.data_root, kind, scene);
    let protocol = SceneProtocol::for_kind(kind);
    let images = match (config.draw, renderer.is_some()) {
        (true, true) => Some(dataset::load_image_pair(&paths)?),
        _ => None,
    };

    let mut report = if kind.is_calibrated() {
        let prepared = load_calibrated_scene(&paths, &protocol)?;
        evaluate_and_render(config, &prepared, estimator, images.as_ref(), renderer)?
    } else {
        let prepared = load_labeled_scene(&paths, &protocol)?;
        evaluate_and_render(config, &prepared, estimator, images.as_ref(), renderer)?
    };
    report.dataset = Some(dataset.name().to_string());
    Ok(report)
}

/// Evaluate every scene of every configured dataset.
pub fn run_benchmark(
    config: &BenchmarkConfig,
    mut renderer: Option<&mut dyn MatchRenderer>,
) -> BenchmarkSummary {
    let mut summary = BenchmarkSummary::default();

    for &dataset in &config.datasets {
        let kind = dataset.kind();
        for &scene in dataset.scenes() {
            info!("---");
            info!(
                "{} estimation on scene \"{scene}\" from dataset \"{dataset}\".",
                kind.name()
            );
            let renderer = renderer
                .as_mut()
                .map(|r| &mut **r as &mut dyn MatchRenderer);
            let result = match kind {
                SceneKind::Homography => {
                    run_scene(config, dataset, scene, &HomographyEstimator::new(), renderer)
                }
                SceneKind::FundamentalMatrix => {
                    run_scene(config, dataset, scene, &FundamentalEstimator::new(), renderer)
                }
                SceneKind::EssentialMatrix => {
                    run_scene(config, dataset, scene, &EssentialEstimator::new(), renderer)
                }
            };
            match result {
                Ok(report) => summary.reports.push(report),
                Err(err) => {
                    error!("Skipping scene \"{scene}\": {err}");
                    summary.failures.push(SceneFailure {
                        dataset: dataset.name().to_string(),
                        scene: scene.to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }
    }

    info!(
        "Evaluated {} scenes, {} skipped, {} runs without a model.",
        summary.reports.len(),
        summary.failures.len(),
        summary.no_model_count()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn protocols_keep_three_distinct_roles() {
        let h = SceneProtocol::for_kind(SceneKind::Homography);
        assert_eq!(h.thresholds.maximum, PixelThreshold(50.0));
        assert_eq!(h.thresholds.reference, PixelThreshold(2.0));
        assert_eq!(h.thresholds.reporting, PixelThreshold(2.5));
        assert_eq!(h.refinement_threshold, Some(PixelThreshold(2.0)));

        let f = SceneProtocol::for_kind(SceneKind::FundamentalMatrix);
        assert_eq!(f.refinement_threshold, Some(PixelThreshold(0.35)));
        assert_eq!(f.thresholds.reporting, PixelThreshold(1.0));

        let e = SceneProtocol::for_kind(SceneKind::EssentialMatrix);
        assert_eq!(e.refinement_threshold, None);
        assert_eq!(e.baseline_threshold, PixelThreshold(3.0));
    }

    #[test]
    fn calibrated_scene_normalizes_every_role_once() {
        let k = nalgebra::Matrix3::new(1000.0, 0.0, 0.0, 0.0, 1000.0, 0.0, 0.0, 0.0, 1.0);
        let points = DataMatrix::from_row_slice(1, 4, &[100.0, 200.0, 300.0, 400.0]);
        let protocol = SceneProtocol::for_kind(SceneKind::EssentialMatrix);
        let scene =
            PreparedScene::calibrated("s", points.clone(), &IntrinsicsPair::new(k, k), &protocol)
                .unwrap();

        assert_relative_eq!(scene.thresholds.maximum.value(), 0.005);
        assert_relative_eq!(scene.thresholds.reference.value(), 0.002);
        assert_relative_eq!(scene.thresholds.reporting.value(), 0.003);
        assert_relative_eq!(scene.baseline_threshold.value(), 0.003);
        assert_relative_eq!(scene.data[(0, 3)], 0.4);
        assert_eq!(scene.display_points, points);
    }

    #[test]
    fn config_defaults_and_partial_json() {
        let cfg = BenchmarkConfig::default();
        assert_eq!(cfg.datasets, Dataset::ALL.to_vec());
        assert_eq!(cfg.evaluation_settings(), EvaluationSettings::default());

        let cfg: BenchmarkConfig = serde_json::from_str(
            r#"{"datasets": ["homogr", "strecha"], "engine": {"max_iterations": 200}}"#,
        )
        .unwrap();
        assert_eq!(cfg.datasets, vec![Dataset::Homogr, Dataset::Strecha]);
        assert_eq!(cfg.evaluation_settings().iteration_limit, 200);
        assert!(cfg.run_baseline);

        let baseline = cfg.baseline_settings(1.0);
        assert_eq!(baseline.scoring, ScoringType::Ransac);
        assert_eq!(baseline.max_iterations, 200);
    }

    #[test]
    fn config_cannot_override_protocol_thresholds() {
        let err = serde_json::from_str::<BenchmarkConfig>(
            r#"{"engine": {"maximum_threshold": 7.0}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("maximum_threshold"));

        let cfg: BenchmarkConfig =
            serde_json::from_str(r#"{"engine": {"random_seed": 9, "min_iterations": 5}}"#)
                .unwrap();
        let magsac = cfg.magsac_settings();
        assert_eq!(magsac.random_seed, Some(9));
        assert_eq!(magsac.min_iterations, 5);
        assert_eq!(magsac.scoring, ScoringType::MagsacPlusPlus);
    }

    /// Engine double that draws one minimal sample and keeps it.
    #[derive(Default)]
    struct FirstSampleEngine {
        drawn: Vec<usize>,
    }

    impl RobustEstimator for FirstSampleEngine {
        fn set_maximum_threshold(&mut self, _threshold: f64) {}

        fn set_reference_threshold(&mut self, _threshold: f64) {}

        fn set_iteration_limit(&mut self, _limit: usize) {}

        fn run<E: Estimator, S: Sampler>(
            &mut self,
            data: &DataMatrix,
            _confidence: f64,
            estimator: &E,
            sampler: &mut S,
        ) -> crate::core::Estimate<E::Model> {
            let mut sample = vec![0; estimator.sample_size()];
            if sampler.sample(data, estimator.sample_size(), &mut sample) {
                self.drawn = sample;
            }
            crate::core::Estimate::failed(1)
        }
    }

    #[test]
    fn contenders_draw_independent_samples() {
        let mut data = DataMatrix::zeros(40, 4);
        for i in 0..40 {
            data[(i, 0)] = i as f64;
            data[(i, 1)] = (i * i) as f64;
        }
        let protocol = SceneProtocol::for_kind(SceneKind::Homography);
        let scene = PreparedScene::unlabeled("seeded", data, &protocol);
        let contender = || {
            Contender::new(
                "first",
                FirstSampleEngine::default(),
                PixelThreshold(50.0),
                PixelThreshold(2.0),
            )
        };
        let mut contenders = vec![contender(), contender()];
        evaluate_scene(
            &scene,
            &HomographyEstimator::new(),
            &mut contenders,
            || UniformRandomSampler::from_seed(21),
            &EvaluationSettings::default(),
        )
        .unwrap();

        assert_eq!(contenders[0].engine.drawn.len(), 4);
        assert_eq!(contenders[0].engine.drawn, contenders[1].engine.drawn);
    }

    #[test]
    fn baseline_reports_at_its_own_threshold() {
        let protocol = SceneProtocol::for_kind(SceneKind::Homography);
        let scene = PreparedScene::unlabeled("s", DataMatrix::zeros(1, 4), &protocol);
        let magsac = Contender::new(
            "MAGSAC++",
            Magsac::default(),
            scene.thresholds.maximum,
            scene.thresholds.reference,
        );
        let baseline = Contender::new(
            "RANSAC",
            Magsac::default(),
            scene.baseline_threshold,
            scene.baseline_threshold,
        )
        .reporting_at(scene.baseline_threshold);
        assert_eq!(magsac.reporting_threshold(&scene), PixelThreshold(2.5));
        assert_eq!(baseline.reporting_threshold(&scene), PixelThreshold(1.0));
    }

    #[test]
    fn config_file_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = BenchmarkConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, RunnerError::Json { .. }));
        assert!(err.to_string().contains("bench.json"));
    }

    #[test]
    fn empty_scene_is_an_error() {
        let scene = PreparedScene::unlabeled(
            "empty",
            DataMatrix::zeros(0, 4),
            &SceneProtocol::for_kind(SceneKind::Homography),
        );
        let mut contenders = vec![Contender::new(
            "MAGSAC++",
            Magsac::default(),
            PixelThreshold(50.0),
            PixelThreshold(2.0),
        )];
        let result = evaluate_scene(
            &scene,
            &HomographyEstimator::new(),
            &mut contenders,
            || UniformRandomSampler::from_seed(0),
            &EvaluationSettings::default(),
        );
        assert!(matches!(result, Err(SceneError::EmptyData(_))));
    }

    #[test]
    fn missing_scenes_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchmarkConfig {
            data_root: dir.path().to_path_buf(),
            datasets: vec![Dataset::MultiH],
            ..BenchmarkConfig::default()
        };
        let summary = run_benchmark(&config, None);
        assert!(summary.reports.is_empty());
        assert_eq!(summary.failures.len(), Dataset::MultiH.scenes().len());
        assert_eq!(summary.failures[0].scene, "boxesandbooks");
    }
}
