use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer is closed and no longer accepts events")]
    Closed,
}

/// What caused a batch to be cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Pending count reached the batch size.
    Threshold,
    /// The periodic timer fired.
    Interval,
    /// Explicit `flush()` from the owner.
    Manual,
    /// Final cut while closing.
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushTrigger::Threshold => write!(f, "threshold"),
            FlushTrigger::Interval => write!(f, "interval"),
            FlushTrigger::Manual => write!(f, "manual"),
            FlushTrigger::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// A group of items detached from the buffer in one cut.
#[derive(Debug)]
pub struct Batch<T> {
    /// Cut order, starting at 0. Strictly increasing per buffer.
    pub seq: u64,
    pub trigger: FlushTrigger,
    pub items: Vec<T>,
}

/// State behind the single mutex. The sender lives here too so a cut and its
/// hand-off happen in one critical section and batches enter the channel in
/// cut order.
struct BufferState<T> {
    pending: Vec<T>,
    next_seq: u64,
    flush_tx: Option<mpsc::UnboundedSender<Batch<T>>>,
}

impl<T> BufferState<T> {
    /// Detach everything pending and queue it for delivery. Returns the number
    /// of items cut.
    fn cut(&mut self, trigger: FlushTrigger) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let items = std::mem::take(&mut self.pending);
        let count = items.len();
        let seq = self.next_seq;
        self.next_seq += 1;

        let batch = Batch {
            seq,
            trigger,
            items,
        };
        match &self.flush_tx {
            Some(tx) => {
                if tx.send(batch).is_err() {
                    warn!(seq, count, %trigger, "delivery worker is gone, batch dropped");
                } else {
                    debug!(seq, count, %trigger, "batch cut");
                }
            }
            None => warn!(seq, count, %trigger, "buffer closed, batch dropped"),
        }
        count
    }
}

/// Accumulates items and cuts them into batches on a count threshold or a timer.
///
/// The lock is never held across `.await`. Handing a batch off is a
/// non-blocking channel send; network work happens on whichever task drains
/// the receiver.
pub struct BatchBuffer<T> {
    state: Arc<Mutex<BufferState<T>>>,
    max_count: usize,
    timer_reset: Arc<Notify>,
}

impl<T> Clone for BatchBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            max_count: self.max_count,
            timer_reset: Arc::clone(&self.timer_reset),
        }
    }
}

impl<T: Send + 'static> BatchBuffer<T> {
    /// `max_count` is clamped to at least 1.
    pub fn new(max_count: usize) -> (Self, mpsc::UnboundedReceiver<Batch<T>>) {
        let max_count = max_count.max(1);
        let (flush_tx, flush_rx) = mpsc::unbounded_channel();
        let buffer = Self {
            state: Arc::new(Mutex::new(BufferState {
                pending: Vec::with_capacity(max_count),
                next_seq: 0,
                flush_tx: Some(flush_tx),
            })),
            max_count,
            timer_reset: Arc::new(Notify::new()),
        };
        (buffer, flush_rx)
    }

    fn lock(&self) -> MutexGuard<'_, BufferState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().flush_tx.is_none()
    }

    /// Add an item; cuts a batch and restarts the timer when the threshold is hit.
    pub fn append(&self, item: T) -> Result<(), BufferError> {
        let mut state = self.lock();
        if state.flush_tx.is_none() {
            return Err(BufferError::Closed);
        }
        state.pending.push(item);
        if state.pending.len() < self.max_count {
            return Ok(());
        }
        state.cut(FlushTrigger::Threshold);
        drop(state);

        self.timer_reset.notify_one();
        Ok(())
    }

    /// Cut whatever is pending. Returns the number of items handed off.
    pub fn flush(&self, trigger: FlushTrigger) -> usize {
        self.lock().cut(trigger)
    }

    /// Cut the remaining items and stop accepting new ones. Dropping the sender
    /// lets the receiver finish once it has drained the final batch.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        let count = state.cut(FlushTrigger::Shutdown);
        state.flush_tx = None;
        count
    }

    /// Spawn the periodic flush. The first tick fires one `period` from now;
    /// a threshold cut pushes the next tick back to a full `period`.
    pub fn spawn_ticker(&self, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let buffer = self.clone();
        let first_tick = Instant::now() + period;
        tokio::spawn(async move {
            let mut interval = time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        buffer.flush(FlushTrigger::Interval);
                    }
                    _ = buffer.timer_reset.notified() => {
                        interval.reset();
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests;
