//! Validation engine
//!
//! This module provides:
//! - Partitioning of the candidate list into contiguous shards
//! - Execution units, one OS thread with a single-threaded runtime each,
//!   that drain a shard through a bounded worker pool
//! - Batched reporting from units back to the orchestrator
//! - The orchestrator that owns all aggregate state for a run

pub mod orchestrator;
pub mod reporter;
pub mod shard;
pub mod worker;

pub use orchestrator::{Orchestrator, RunOutcome, RunState};
pub use reporter::BatchReporter;
pub use shard::{partition, shard_sizes};
pub use worker::WorkerPool;

use crate::proxy::models::ProbeResult;
use std::time::Duration;

/// Default number of in-flight probes per execution unit
const DEFAULT_CONCURRENCY: usize = 50;

/// Default period between batched reports in milliseconds
const DEFAULT_REPORT_INTERVAL_MS: u64 = 500;

/// Default period between progress recomputations in milliseconds
const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1_000;

/// Unit count used when the number of cores cannot be detected
pub const FALLBACK_UNITS: usize = 4;

/// Start message handed to an execution unit
#[derive(Debug, Clone)]
pub struct StartMessage {
    pub own_ip: String,
    pub shard: Vec<String>,
}

/// Candidates completed by one unit since its previous report
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub unit: usize,
    pub checked: usize,
    pub found: Vec<ProbeResult>,
}

/// Messages flowing from execution units to the orchestrator
#[derive(Debug, Clone)]
pub enum UnitEvent {
    Report(BatchReport),
    Exited { unit: usize },
}

/// Configuration for the validation engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of execution units; `None` means one per available core
    pub units: Option<usize>,
    /// Maximum in-flight probes per unit
    pub concurrency: usize,
    /// How often a unit flushes its buffered results
    pub report_interval: Duration,
    /// How often the orchestrator recomputes and publishes progress
    pub progress_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            units: None,
            concurrency: DEFAULT_CONCURRENCY,
            report_interval: Duration::from_millis(DEFAULT_REPORT_INTERVAL_MS),
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_units(mut self, units: usize) -> Self {
        self.units = Some(units);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Resolved unit count, never zero
    pub fn unit_count(&self) -> usize {
        self.units.unwrap_or_else(detect_cores).max(1)
    }
}

/// Number of available processing cores, or [`FALLBACK_UNITS`]
pub fn detect_cores() -> usize {
    match num_cpus::get() {
        0 => FALLBACK_UNITS,
        n => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.units, None);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(
            config.report_interval,
            Duration::from_millis(DEFAULT_REPORT_INTERVAL_MS)
        );
        assert!(config.unit_count() >= 1);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new()
            .with_units(3)
            .with_concurrency(7)
            .with_report_interval(Duration::from_millis(50))
            .with_progress_interval(Duration::from_millis(20));

        assert_eq!(config.unit_count(), 3);
        assert_eq!(config.concurrency, 7);
        assert_eq!(config.report_interval, Duration::from_millis(50));
        assert_eq!(config.progress_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_zero_units_clamped() {
        assert_eq!(EngineConfig::new().with_units(0).unit_count(), 1);
    }
}
