//! ProxyIP Validator - sharded TLS relay proxy checker
//!
//! Validates candidate proxies by opening a TLS connection through each one
//! to a fixed metadata endpoint and keeping those that relay the request and
//! report a client address other than our own. Candidates are split into
//! shards, one per core, each drained by a bounded pool of concurrent probes.

pub mod engine;
pub mod error;
pub mod output;
pub mod proxy;
pub mod tui;

pub use engine::{EngineConfig, Orchestrator, RunOutcome};
pub use error::LoadError;
pub use proxy::*;

use output::OutputPaths;
use std::path::PathBuf;
use std::time::Duration;
use tui::ProgressMode;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Default timeout for own-address lookups in seconds
const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Candidate list file
    pub input: PathBuf,
    pub engine: EngineConfig,
    pub checker: CheckerConfig,
    /// Timeout for each own-address lookup request
    pub lookup_timeout: Duration,
    pub output: OutputPaths,
    pub progress: ProgressMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("raw.txt"),
            engine: EngineConfig::default(),
            checker: CheckerConfig::default(),
            lookup_timeout: Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS),
            output: OutputPaths::default(),
            progress: ProgressMode::Auto,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: PathBuf) -> Self {
        self.input = input;
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_checker(mut self, checker: CheckerConfig) -> Self {
        self.checker = checker;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_output(mut self, output: OutputPaths) -> Self {
        self.output = output;
        self
    }

    pub fn with_progress(mut self, progress: ProgressMode) -> Self {
        self.progress = progress;
        self
    }
}
