//! Batched reporting from an execution unit to the orchestrator

use crate::engine::{BatchReport, UnitEvent};
use crate::proxy::models::ProbeResult;
use tokio::sync::mpsc::UnboundedSender;

/// Buffers probe outcomes and sends them upstream in batches
pub struct BatchReporter {
    unit: usize,
    tx: UnboundedSender<UnitEvent>,
    pending_checked: usize,
    pending_found: Vec<ProbeResult>,
}

impl BatchReporter {
    pub fn new(unit: usize, tx: UnboundedSender<UnitEvent>) -> Self {
        Self {
            unit,
            tx,
            pending_checked: 0,
            pending_found: Vec::new(),
        }
    }

    /// Record one completed probe, successful or not
    pub fn record(&mut self, outcome: Option<ProbeResult>) {
        self.pending_checked += 1;
        if let Some(result) = outcome {
            self.pending_found.push(result);
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending_checked > 0
    }

    /// Send everything buffered since the last flush.
    ///
    /// Does nothing when no probe completed in between. Buffers are reset
    /// even if the orchestrator is gone; returns whether a report was
    /// delivered.
    pub fn flush(&mut self) -> bool {
        if !self.has_pending() {
            return false;
        }

        let report = BatchReport {
            unit: self.unit,
            checked: std::mem::take(&mut self.pending_checked),
            found: std::mem::take(&mut self.pending_found),
        };
        match self.tx.send(UnitEvent::Report(report)) {
            Ok(()) => true,
            Err(_) => {
                tracing::trace!(unit = self.unit, "orchestrator gone, dropping report");
                false
            }
        }
    }
}
