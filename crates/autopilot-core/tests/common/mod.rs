#![allow(dead_code)]

use std::sync::Arc;

use autopilot_core::config::{PipelineConfig, SimulationProfile};
use autopilot_core::domain::{TaskId, TaskRow};
use autopilot_core::ports::{
    FixedClock, InstantSleeper, SeededRandom, SequentialIdGenerator, Sleeper,
};
use autopilot_core::{Pipeline, PipelineBuilder};
use chrono::{TimeZone, Utc};

/// Deterministic pipeline: sequential ids, fixed clock, seeded rng, no real waiting.
pub fn pipeline(seed: u64, simulation: SimulationProfile) -> Pipeline {
    pipeline_with_sleeper(seed, simulation, Arc::new(InstantSleeper))
}

/// Same as `pipeline`, with the given sleeper.
pub fn pipeline_with_sleeper(
    seed: u64,
    simulation: SimulationProfile,
    sleeper: Arc<dyn Sleeper>,
) -> Pipeline {
    let config = PipelineConfig {
        simulation,
        ..PipelineConfig::default()
    };
    PipelineBuilder::new(config)
        .clock(Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap(),
        )))
        .random(Arc::new(SeededRandom::new(seed)))
        .sleeper(sleeper)
        .ids(Arc::new(SequentialIdGenerator::new()))
        .build()
        .unwrap()
}

/// Ingests `n` rows `LE-001`, `LE-002`, ... as one batch.
pub async fn ingest(pipeline: &Pipeline, n: usize) -> Vec<TaskId> {
    let rows = (1..=n)
        .map(|i| TaskRow::new("ORG-1", format!("CMP-{i}"), format!("LE-{i:03}")))
        .collect();
    pipeline
        .store
        .ingest_rows("January payroll", rows)
        .await
        .unwrap()
        .task_ids
}
