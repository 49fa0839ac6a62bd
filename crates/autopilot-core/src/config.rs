//! Pipeline configuration.
//!
//! Every field has a default, so a JSON file only needs to name what it
//! overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub orchestrator: OrchestratorConfig,
    pub simulation: SimulationProfile,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        let config: PipelineConfig = serde_json::from_str(json)
            .map_err(|e| PipelineError::bad_request(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PipelineError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::bad_request(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        self.orchestrator.validate()?;
        self.simulation.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Upper bound on tasks with an in-flight lifecycle.
    pub max_concurrent: usize,
    /// How long an idle worker waits before rechecking for a free slot.
    pub idle_poll_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            idle_poll_ms: 50,
        }
    }
}

impl OrchestratorConfig {
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.max_concurrent == 0 {
            return Err(PipelineError::bad_request("maxConcurrent must be at least 1"));
        }
        Ok(())
    }
}

/// Inclusive range for uniform draws (milliseconds or cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformRange {
    pub min: u64,
    pub max: u64,
}

impl UniformRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

/// Odds and timings of the simulated pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationProfile {
    pub failure_probability: f64,
    pub not_ready_probability: f64,
    pub review_probability: f64,
    /// Relative weights in pipeline order (payroll-download first).
    pub failure_step_weights: [f64; 4],
    pub step_duration: UniformRange,
    pub processing_duration: UniformRange,
    pub sum_check_range: UniformRange,
    pub review_base_url: String,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            failure_probability: 0.35,
            not_ready_probability: 0.10,
            review_probability: 0.15,
            failure_step_weights: [0.15, 0.20, 0.45, 0.20],
            step_duration: UniformRange::new(800, 2_000),
            processing_duration: UniformRange::new(4_000, 7_000),
            // cents
            sum_check_range: UniformRange::new(500_000, 25_000_000),
            review_base_url: "https://review.autopilot.local/tasks".to_string(),
        }
    }
}

impl SimulationProfile {
    /// Never fails, never blocks on review or missing data.
    pub fn always_succeed() -> Self {
        Self {
            failure_probability: 0.0,
            not_ready_probability: 0.0,
            review_probability: 0.0,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), PipelineError> {
        for (name, p) in [
            ("failureProbability", self.failure_probability),
            ("notReadyProbability", self.not_ready_probability),
            ("reviewProbability", self.review_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(PipelineError::bad_request(format!(
                    "{name} must be within 0..=1, got {p}"
                )));
            }
        }
        if self.failure_step_weights.iter().any(|w| *w < 0.0 || !w.is_finite())
            || self.failure_step_weights.iter().sum::<f64>() <= 0.0
        {
            return Err(PipelineError::bad_request(
                "failureStepWeights must be non-negative with a positive sum",
            ));
        }
        for (name, range) in [
            ("stepDuration", self.step_duration),
            ("processingDuration", self.processing_duration),
            ("sumCheckRange", self.sum_check_range),
        ] {
            if range.min > range.max {
                return Err(PipelineError::bad_request(format!(
                    "{name} has min {} above max {}",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_simulation() {
        let config = PipelineConfig::default();
        assert_eq!(config.orchestrator.max_concurrent, 4);
        assert_eq!(config.simulation.failure_probability, 0.35);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config = PipelineConfig::from_json_str(
            r#"{"orchestrator":{"maxConcurrent":2},"simulation":{"failureProbability":0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.orchestrator.max_concurrent, 2);
        assert_eq!(config.orchestrator.idle_poll_ms, 50);
        assert_eq!(config.simulation.failure_probability, 0.5);
        assert_eq!(config.simulation.review_probability, 0.15);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(PipelineConfig::from_json_str(r#"{"orchestrator":{"maxConcurrent":0}}"#).is_err());
        assert!(
            PipelineConfig::from_json_str(r#"{"simulation":{"reviewProbability":1.5}}"#).is_err()
        );
        assert!(
            PipelineConfig::from_json_str(
                r#"{"simulation":{"stepDuration":{"min":10,"max":5}}}"#
            )
            .is_err()
        );
        assert!(PipelineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"orchestrator":{{"idlePollMs":5}}}}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.orchestrator.idle_poll(), Duration::from_millis(5));
    }
}
