//! Engine configuration.
//!
//! Defaults follow the benchmark protocol: 0.99 confidence, at most 10 000
//! iterations, MAGSAC++ scoring with a 2 px reference threshold.

use serde::{Deserialize, Serialize};

/// Scoring strategy used to evaluate models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringType {
    /// Inlier count at the maximum threshold, with least-squares polishing.
    Ransac,
    /// Sigma-consensus++ loss, with marginalized IRLS polishing.
    MagsacPlusPlus,
}

impl ScoringType {
    pub fn name(&self) -> &'static str {
        match self {
            ScoringType::Ransac => "RANSAC",
            ScoringType::MagsacPlusPlus => "MAGSAC++",
        }
    }
}

/// Main configuration object for the robust estimation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagsacSettings {
    /// Iterations drawn even when the adaptive bound is already met.
    pub min_iterations: usize,
    /// Hard cap on the number of iterations.
    pub max_iterations: usize,
    /// Upper bound on the noise scale, in data units.
    pub maximum_threshold: f64,
    /// Inlier threshold feeding the adaptive stopping bound, in data units.
    pub reference_threshold: f64,
    pub scoring: ScoringType,
    /// IRLS rounds run on every new best model and once more at the end.
    pub polishing_iterations: usize,
    /// Seed for reproducible sampling, `None` for entropy.
    pub random_seed: Option<u64>,
}

impl Default for MagsacSettings {
    fn default() -> Self {
        Self {
            min_iterations: 50,
            max_iterations: 10_000,
            maximum_threshold: 10.0,
            reference_threshold: 2.0,
            scoring: ScoringType::MagsacPlusPlus,
            polishing_iterations: 10,
            random_seed: None,
        }
    }
}

impl MagsacSettings {
    /// Baseline configuration: plain RANSAC at a fixed inlier threshold.
    pub fn ransac(threshold: f64) -> Self {
        Self {
            maximum_threshold: threshold,
            reference_threshold: threshold,
            scoring: ScoringType::Ransac,
            polishing_iterations: 1,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_benchmark_protocol() {
        let cfg = MagsacSettings::default();
        assert_eq!(cfg.min_iterations, 50);
        assert_eq!(cfg.max_iterations, 10_000);
        assert!((cfg.reference_threshold - 2.0).abs() < 1e-12);
        assert_eq!(cfg.scoring, ScoringType::MagsacPlusPlus);
        assert_eq!(cfg.random_seed, None);
    }

    #[test]
    fn ransac_baseline_uses_one_threshold() {
        let cfg = MagsacSettings::ransac(1.0);
        assert_eq!(cfg.scoring, ScoringType::Ransac);
        assert_eq!(cfg.maximum_threshold, cfg.reference_threshold);
        assert_eq!(cfg.max_iterations, MagsacSettings::default().max_iterations);
    }

    #[test]
    fn scoring_type_round_trips_through_json() {
        let json = serde_json::to_string(&ScoringType::MagsacPlusPlus).unwrap();
        assert_eq!(json, "\"magsac_plus_plus\"");
        let back: ScoringType = serde_json::from_str("\"ransac\"").unwrap();
        assert_eq!(back, ScoringType::Ransac);
    }

    #[test]
    fn partial_settings_fall_back_to_defaults() {
        let cfg: MagsacSettings =
            serde_json::from_str(r#"{"max_iterations": 500, "random_seed": 3}"#).unwrap();
        assert_eq!(cfg.max_iterations, 500);
        assert_eq!(cfg.random_seed, Some(3));
        assert_eq!(cfg.min_iterations, 50);
    }
}
