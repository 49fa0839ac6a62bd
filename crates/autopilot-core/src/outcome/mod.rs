//! Outcome generation: fates, random draws and simulated step payloads.

pub mod fate;
pub mod generator;
pub mod payload;

pub use fate::{Fate, PlannedAction};
pub use generator::{EnrichedData, OutcomeGenerator};
