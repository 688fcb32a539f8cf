//! Execution units and the bounded worker pool that drains their shard

use crate::engine::reporter::BatchReporter;
use crate::engine::{StartMessage, UnitEvent};
use crate::proxy::checker::Prober;
use crate::Result;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

/// Shortest accepted report period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Runs probes over one shard with at most `concurrency` in flight
pub struct WorkerPool<P: Prober> {
    prober: Arc<P>,
    concurrency: usize,
    report_interval: Duration,
}

impl<P: Prober> WorkerPool<P> {
    pub fn new(prober: Arc<P>, concurrency: usize, report_interval: Duration) -> Self {
        Self {
            prober,
            concurrency: concurrency.max(1),
            report_interval: report_interval.max(MIN_INTERVAL),
        }
    }

    /// Probe every candidate of `shard` exactly once.
    ///
    /// Each completion frees a slot that is refilled from the shard cursor.
    /// The reporter is flushed on every report tick; the caller owns the
    /// final flush. Returns the number of candidates processed.
    pub async fn run(
        &self,
        shard: Vec<String>,
        own_ip: &str,
        reporter: &mut BatchReporter,
    ) -> usize {
        let own_ip: Arc<str> = Arc::from(own_ip);
        let mut cursor = shard.into_iter();
        let mut active = JoinSet::new();
        let mut processed = 0;

        let mut ticker = time::interval_at(
            time::Instant::now() + self.report_interval,
            self.report_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            while active.len() < self.concurrency {
                let Some(candidate) = cursor.next() else {
                    break;
                };
                let prober = Arc::clone(&self.prober);
                let own_ip = Arc::clone(&own_ip);
                active.spawn(async move { prober.probe(&candidate, &own_ip).await });
            }

            if active.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = active.join_next() => {
                    let outcome = joined.unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "probe task aborted");
                        None
                    });
                    reporter.record(outcome);
                    processed += 1;
                }
                _ = ticker.tick() => {
                    reporter.flush();
                }
            }
        }

        processed
    }
}

/// Sends the termination event when dropped, so the orchestrator learns
/// about a unit that exits early or panics.
struct ExitNotice {
    unit: usize,
    tx: UnboundedSender<UnitEvent>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.tx.send(UnitEvent::Exited { unit: self.unit });
    }
}

/// Settings shared by every execution unit of a run
#[derive(Debug, Clone)]
pub struct UnitSettings {
    pub concurrency: usize,
    pub report_interval: Duration,
}

/// Start execution unit `unit` on its own thread with a single-threaded
/// runtime. The unit waits for its [`StartMessage`], drains the shard,
/// performs a final flush and then reports its exit.
pub fn spawn_unit<P: Prober>(
    unit: usize,
    prober: Arc<P>,
    settings: UnitSettings,
    start: oneshot::Receiver<StartMessage>,
    tx: UnboundedSender<UnitEvent>,
) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name(format!("unit-{}", unit))
        .spawn(move || {
            let _exit = ExitNotice {
                unit,
                tx: tx.clone(),
            };

            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!(unit, error = %e, "failed to start unit runtime");
                    return;
                }
            };

            runtime.block_on(async move {
                let Ok(start) = start.await else {
                    tracing::debug!(unit, "unit dropped before start");
                    return;
                };

                let shard_len = start.shard.len();
                tracing::debug!(unit, shard_len, "unit started");

                let pool = WorkerPool::new(prober, settings.concurrency, settings.report_interval);
                let mut reporter = BatchReporter::new(unit, tx);
                let processed = pool.run(start.shard, &start.own_ip, &mut reporter).await;
                reporter.flush();

                tracing::debug!(unit, processed, "unit finished");
            });
        })?;

    Ok(handle)
}
