use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::buffers::{Batch, FlushTrigger};
use crate::dispatcher::{Dispatch, DispatchError};
use crate::event::Event;

/// Outcome of one batch hand-off to the dispatcher.
///
/// Failed batches are not retried or requeued; the report is the only trace of them.
#[derive(Debug)]
pub struct DeliveryReport {
    pub seq: u64,
    pub trigger: FlushTrigger,
    pub events: usize,
    pub outcome: Result<(), DispatchError>,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.outcome.is_ok()
    }
}

pub type DeliveryCallback = Arc<dyn Fn(&DeliveryReport) + Send + Sync>;

/// Running totals across every batch the worker has handled.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    events_accepted: AtomicU64,
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    events_delivered: AtomicU64,
    events_lost: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryCounts {
    /// Events accepted by `append`.
    pub events_accepted: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub events_delivered: u64,
    pub events_lost: u64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliveryCounts {
        DeliveryCounts {
            events_accepted: self.events_accepted.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_lost: self.events_lost.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_accepted(&self) {
        self.events_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, report: &DeliveryReport) {
        let events = report.events as u64;
        if report.is_delivered() {
            self.batches_sent.fetch_add(1, Ordering::Relaxed);
            self.events_delivered.fetch_add(events, Ordering::Relaxed);
        } else {
            self.batches_failed.fetch_add(1, Ordering::Relaxed);
            self.events_lost.fetch_add(events, Ordering::Relaxed);
        }
    }

    /// Count events that never reached the dispatcher (e.g. abandoned at shutdown).
    pub(crate) fn record_abandoned(&self, events: u64) {
        self.events_lost.fetch_add(events, Ordering::Relaxed);
    }
}

/// Publishes reports to the stats, the log, and the optional callback.
pub(crate) struct Reporter {
    stats: Arc<DeliveryStats>,
    callback: Option<DeliveryCallback>,
}

impl Reporter {
    pub(crate) fn new(stats: Arc<DeliveryStats>, callback: Option<DeliveryCallback>) -> Self {
        Self { stats, callback }
    }

    pub(crate) fn publish(&self, report: &DeliveryReport) {
        self.stats.record(report);
        match &report.outcome {
            Ok(()) => debug!(
                seq = report.seq,
                events = report.events,
                trigger = %report.trigger,
                "batch delivered"
            ),
            Err(e) => warn!(
                seq = report.seq,
                events = report.events,
                trigger = %report.trigger,
                error = %e,
                "batch not delivered, events dropped"
            ),
        }
        if let Some(callback) = &self.callback {
            callback(report);
        }
    }
}

/// Drain cut batches one at a time, in cut order, until the buffer closes.
pub(crate) async fn run<D: Dispatch>(
    mut rx: mpsc::UnboundedReceiver<Batch<Event>>,
    dispatcher: Arc<D>,
    reporter: Reporter,
) {
    while let Some(batch) = rx.recv().await {
        let outcome = dispatcher.send_batch(&batch.items).await;
        reporter.publish(&DeliveryReport {
            seq: batch.seq,
            trigger: batch.trigger,
            events: batch.items.len(),
            outcome,
        });
    }
    debug!("delivery worker finished");
}
