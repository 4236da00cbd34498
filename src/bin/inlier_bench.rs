use std::path::PathBuf;

use argh::FromArgs;
use inlier_bench::dataset::Dataset;
use inlier_bench::harness::{run_benchmark, BenchmarkConfig};
use inlier_bench::visualization::{MatchImageWriter, MatchRenderer};
use log::{error, info};

/// Benchmarks MAGSAC++ against RANSAC on annotated two-view scenes.
#[derive(Debug, FromArgs)]
struct Args {
    /// JSON configuration file; command-line options override it
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// folder holding the homography, fundamental_matrix and essential_matrix data
    #[argh(option, short = 'd')]
    data_root: Option<PathBuf>,

    /// dataset to evaluate, repeatable (default: all of them)
    #[argh(option)]
    dataset: Vec<Dataset>,

    /// required confidence of the result
    #[argh(option)]
    confidence: Option<f64>,

    /// hard cap on the number of sampling iterations
    #[argh(option, short = 'n')]
    iteration_limit: Option<usize>,

    /// seed for reproducible sampling
    #[argh(option)]
    seed: Option<u64>,

    /// skip the RANSAC baseline
    #[argh(switch)]
    skip_baseline: bool,

    /// render the inlier matches of every run
    #[argh(switch)]
    draw: bool,

    /// folder receiving the rendered matches
    #[argh(option, short = 'o')]
    output_dir: Option<PathBuf>,

    /// wait for Enter after every rendered scene
    #[argh(switch, short = 'w')]
    wait: bool,

    /// write a JSON summary of the run to this file
    #[argh(option, short = 'r')]
    report: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<BenchmarkConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => BenchmarkConfig::from_json_file(path)?,
            None => BenchmarkConfig::default(),
        };
        if let Some(root) = self.data_root {
            config.data_root = root;
        }
        if !self.dataset.is_empty() {
            config.datasets = self.dataset;
        }
        if let Some(confidence) = self.confidence {
            config.confidence = confidence;
        }
        if let Some(limit) = self.iteration_limit {
            config.engine.max_iterations = limit;
        }
        if self.seed.is_some() {
            config.engine.random_seed = self.seed;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(report) = self.report {
            config.report = Some(report);
        }
        config.run_baseline &= !self.skip_baseline;
        config.draw |= self.draw;
        config.wait_for_key |= self.wait;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = argh::from_env::<Args>().into_config()?;
    if !(config.confidence > 0.0 && config.confidence < 1.0) {
        return Err(format!("confidence must be in (0, 1), got {}", config.confidence).into());
    }
    info!(
        "Data root: {}, datasets: {}",
        config.data_root.display(),
        config
            .datasets
            .iter()
            .map(Dataset::name)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut writer = MatchImageWriter::new(config.output_dir.clone());
    let renderer = config
        .draw
        .then_some(&mut writer as &mut dyn MatchRenderer);
    let summary = run_benchmark(&config, renderer);

    if let Some(path) = &config.report {
        match summary.write_json(path) {
            Ok(()) => info!("Report written to {}", path.display()),
            Err(err) => error!("{err}"),
        }
    }
    Ok(())
}
