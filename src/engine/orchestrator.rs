//! Orchestrator owning sharding, unit lifecycle and aggregation for a run

use crate::engine::shard::partition;
use crate::engine::worker::{spawn_unit, UnitSettings};
use crate::engine::{BatchReport, EngineConfig, StartMessage, UnitEvent};
use crate::proxy::checker::Prober;
use crate::proxy::models::{RunStats, VerifiedSet};
use crate::Result;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, MissedTickBehavior};

/// Aggregate state of a run, mutated only by the orchestrator's event loop
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub stats: RunStats,
    pub verified: VerifiedSet,
}

impl RunState {
    pub fn new(total: usize, units: usize) -> Self {
        Self {
            stats: RunStats::new(total, units),
            verified: VerifiedSet::new(),
        }
    }

    /// Fold a batched report into the totals. Results whose `host:port` is
    /// already verified are ignored. Returns how many were new.
    pub fn apply_report(&mut self, report: BatchReport) -> usize {
        self.stats.checked += report.checked;

        let mut added = 0;
        for result in report.found {
            if self.verified.insert(result) {
                added += 1;
            }
        }
        self.stats.found += added;
        added
    }

    /// Record a unit termination; returns `true` once no unit is left
    pub fn unit_exited(&mut self) -> bool {
        self.stats.running_units = self.stats.running_units.saturating_sub(1);
        self.stats.is_complete()
    }
}

/// Final state of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub stats: RunStats,
    pub verified: VerifiedSet,
    pub elapsed: Duration,
}

/// Drives one validation run across all execution units
pub struct Orchestrator<P: Prober> {
    prober: Arc<P>,
    config: EngineConfig,
}

impl<P: Prober> Orchestrator<P> {
    pub fn new(prober: Arc<P>, config: EngineConfig) -> Self {
        Self { prober, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate `candidates` and return the verified set.
    ///
    /// Progress snapshots are published on `progress`, if given, every
    /// progress interval and once more at completion.
    pub async fn run(
        &self,
        candidates: Vec<String>,
        own_ip: &str,
        progress: Option<watch::Sender<RunStats>>,
    ) -> Result<RunOutcome> {
        let started = Instant::now();
        let total = candidates.len();
        let shards = partition(candidates, self.config.unit_count());
        let mut state = RunState::new(total, shards.len());

        tracing::info!(total, units = shards.len(), "starting validation run");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let settings = UnitSettings {
            concurrency: self.config.concurrency,
            report_interval: self.config.report_interval,
        };

        let handles = launch_units(shards, own_ip, |unit, start| {
            spawn_unit(
                unit,
                Arc::clone(&self.prober),
                settings.clone(),
                start,
                tx.clone(),
            )
        })
        .await?;
        drop(tx);

        let period = self.config.progress_interval.max(Duration::from_millis(1));
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(UnitEvent::Report(report)) => {
                        state.apply_report(report);
                    }
                    Some(UnitEvent::Exited { unit }) => {
                        tracing::debug!(unit, "unit exited");
                        if state.unit_exited() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    state.stats.update_speed(started.elapsed());
                    publish(&progress, &state.stats);
                }
            }
        }

        let elapsed = started.elapsed();
        state.stats.running_units = 0;
        state.stats.update_speed(elapsed);
        publish(&progress, &state.stats);

        join_units(handles).await;

        tracing::info!(
            checked = state.stats.checked,
            found = state.stats.found,
            elapsed_ms = elapsed.as_millis() as u64,
            "validation run complete"
        );

        Ok(RunOutcome {
            stats: state.stats,
            verified: state.verified,
            elapsed,
        })
    }
}

/// Spawn one unit per shard, then hand every unit its start message.
///
/// No unit receives work until all of them are running. If a spawn fails,
/// the pending start senders are dropped so the units already running exit
/// without work, and they are joined before the error is returned.
async fn launch_units<F>(
    shards: Vec<Vec<String>>,
    own_ip: &str,
    mut spawn: F,
) -> Result<Vec<JoinHandle<()>>>
where
    F: FnMut(usize, oneshot::Receiver<StartMessage>) -> Result<JoinHandle<()>>,
{
    let mut handles = Vec::with_capacity(shards.len());
    let mut pending = Vec::with_capacity(shards.len());

    for (unit, shard) in shards.into_iter().enumerate() {
        let (start_tx, start_rx) = oneshot::channel();
        match spawn(unit, start_rx) {
            Ok(handle) => {
                handles.push(handle);
                pending.push((unit, start_tx, shard));
            }
            Err(e) => {
                tracing::error!(unit, error = %e, "failed to spawn execution unit");
                drop(pending);
                join_units(handles).await;
                return Err(e);
            }
        }
    }

    for (unit, start_tx, shard) in pending {
        let start = StartMessage {
            own_ip: own_ip.to_string(),
            shard,
        };
        if start_tx.send(start).is_err() {
            tracing::warn!(unit, "unit exited before receiving its shard");
        }
    }

    Ok(handles)
}

async fn join_units(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_or(true, |joined| joined.is_err())
        {
            tracing::warn!("execution unit thread panicked");
        }
    }
}

fn publish(progress: &Option<watch::Sender<RunStats>>, stats: &RunStats) {
    if let Some(tx) = progress {
        let _ = tx.send(stats.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::ProbeResult;
    use futures::future::BoxFuture;

    /// Never finds anything
    struct IdleProber;

    impl Prober for IdleProber {
        fn probe<'a>(
            &'a self,
            _candidate: &'a str,
            _own_ip: &'a str,
        ) -> BoxFuture<'a, Option<ProbeResult>> {
            Box::pin(async { None })
        }
    }

    fn found(host: &str, port: u16) -> ProbeResult {
        ProbeResult {
            host: host.to_string(),
            port,
            client_ip: "9.9.9.9".to_string(),
            latency_ms: 10,
            country: Some("DE".to_string()),
            organization: None,
            city: None,
            colo: None,
        }
    }

    #[test]
    fn test_apply_report_dedups_across_units() {
        let mut state = RunState::new(10, 2);

        let added = state.apply_report(BatchReport {
            unit: 0,
            checked: 4,
            found: vec![found("1.2.3.4", 443), found("5.6.7.8", 443)],
        });
        assert_eq!(added, 2);

        let added = state.apply_report(BatchReport {
            unit: 1,
            checked: 3,
            found: vec![found("1.2.3.4", 443), found("1.2.3.4", 8443)],
        });
        assert_eq!(added, 1);

        assert_eq!(state.stats.checked, 7);
        assert_eq!(state.stats.found, 3);
        assert_eq!(state.verified.len(), 3);
        let keys: Vec<String> = state.verified.iter().map(ProbeResult::key).collect();
        assert_eq!(keys, vec!["1.2.3.4:443", "5.6.7.8:443", "1.2.3.4:8443"]);
    }

    #[test]
    fn test_unit_exits_complete_run() {
        let mut state = RunState::new(0, 2);
        assert!(!state.unit_exited());
        assert!(state.unit_exited());
        assert!(state.unit_exited());
    }

    #[tokio::test]
    async fn test_failed_spawn_releases_started_units() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let prober = Arc::new(IdleProber);
        let settings = UnitSettings {
            concurrency: 1,
            report_interval: Duration::from_millis(10),
        };
        let shards = vec![vec!["1.2.3.4:443".to_string()]; 3];

        let launched = launch_units(shards, "1.1.1.1", |unit, start| {
            if unit == 2 {
                anyhow::bail!("thread limit reached");
            }
            spawn_unit(
                unit,
                Arc::clone(&prober),
                settings.clone(),
                start,
                tx.clone(),
            )
        })
        .await;
        assert!(launched.is_err());
        drop(tx);

        let mut exited = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                UnitEvent::Exited { unit } => exited.push(unit),
                UnitEvent::Report(report) => panic!("unit {} ran without a start", report.unit),
            }
        }
        exited.sort_unstable();
        assert_eq!(exited, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_every_unit_gets_its_shard() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let prober = Arc::new(IdleProber);
        let settings = UnitSettings {
            concurrency: 2,
            report_interval: Duration::from_secs(60),
        };
        let shards = vec![vec!["1.2.3.4:443".to_string(); 2]; 3];

        let handles = launch_units(shards, "1.1.1.1", |unit, start| {
            spawn_unit(
                unit,
                Arc::clone(&prober),
                settings.clone(),
                start,
                tx.clone(),
            )
        })
        .await
        .unwrap();
        assert_eq!(handles.len(), 3);
        join_units(handles).await;
        drop(tx);

        let mut checked = 0;
        while let Some(event) = rx.recv().await {
            if let UnitEvent::Report(report) = event {
                checked += report.checked;
            }
        }
        assert_eq!(checked, 6);
    }
}
