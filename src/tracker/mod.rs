use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::buffers::{BatchBuffer, BufferError, FlushTrigger};
use crate::config::{ConfigError, TrackerConfig};
use crate::delivery::{self, DeliveryCallback, DeliveryCounts, DeliveryStats, Reporter};
use crate::dispatcher::{Dispatch, DispatchError, HttpDispatcher};
use crate::event::{CustomEvent, Event};
use crate::params::ParameterError;
use crate::params::vocab::SessionControl;
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build dispatcher: {0}")]
    Dispatcher(#[from] DispatchError),
}

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("event rejected: {0}")]
    InvalidParameter(#[from] ParameterError),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("delivery did not finish within {grace:?}, {abandoned} events abandoned")]
    GraceElapsed { grace: Duration, abandoned: u64 },

    #[error("delivery worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Front door of the pipeline: builds events, buffers them, and owns the
/// ticker and delivery tasks.
///
/// Construct inside a Tokio runtime. Dropping without [`Tracker::shutdown`]
/// still cuts the pending batch, but nothing waits for it to be sent.
pub struct Tracker<D: Dispatch = HttpDispatcher> {
    settings: Settings,
    buffer: BatchBuffer<Event>,
    dispatcher: Arc<D>,
    stats: Arc<DeliveryStats>,
    cancel: CancellationToken,
    ticker: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl Tracker<HttpDispatcher> {
    /// Start a tracker that talks to the configured collector.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start(
        config: &TrackerConfig,
        on_delivery: Option<DeliveryCallback>,
    ) -> Result<Self, InitError> {
        let settings = Settings::new(config.profile.clone());
        let dispatcher = HttpDispatcher::new(config, settings.clone())?;
        Ok(Self::with_dispatcher(config, settings, dispatcher, on_delivery))
    }

    /// [`Tracker::start`] with configuration read from `GA_TRACKER_*` variables.
    pub fn from_env(on_delivery: Option<DeliveryCallback>) -> Result<Self, InitError> {
        let config = TrackerConfig::from_env()?;
        Self::start(&config, on_delivery)
    }
}

impl<D: Dispatch> Tracker<D> {
    /// Start the ticker and delivery tasks around a caller-supplied dispatcher.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since both tasks are
    /// spawned on the current runtime.
    pub fn with_dispatcher(
        config: &TrackerConfig,
        settings: Settings,
        dispatcher: D,
        on_delivery: Option<DeliveryCallback>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let dispatcher = Arc::new(dispatcher);
        let stats = Arc::new(DeliveryStats::default());

        let (buffer, flush_rx) = BatchBuffer::new(config.max_batch_events);
        let ticker = buffer.spawn_ticker(config.flush_interval, cancel.clone());
        let worker = tokio::spawn(delivery::run(
            flush_rx,
            Arc::clone(&dispatcher),
            Reporter::new(Arc::clone(&stats), on_delivery),
        ));

        debug!(
            max_batch_events = buffer.max_count(),
            flush_interval_ms = config.flush_interval.as_millis() as u64,
            "tracker started"
        );

        Self {
            settings,
            buffer,
            dispatcher,
            stats,
            cancel,
            ticker: Some(ticker),
            worker: Some(worker),
        }
    }

    /// Shared settings; setters take effect on the next send.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> DeliveryCounts {
        self.stats.snapshot()
    }

    /// Events waiting for the next cut.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn append(&self, event: Event) -> Result<(), TrackError> {
        self.buffer.append(event)?;
        self.stats.record_accepted();
        Ok(())
    }

    /// Cut whatever is pending now instead of waiting for a trigger.
    pub fn flush(&self) -> usize {
        self.buffer.flush(FlushTrigger::Manual)
    }

    /// Send one event immediately on the `collect` endpoint, bypassing the buffer.
    pub async fn send_now(&self, event: &Event) -> Result<(), DispatchError> {
        let result = self.dispatcher.send_event(event).await;
        if let Err(e) = &result {
            warn!(error = %e, hit_type = ?event.hit_type(), "single hit not delivered");
        }
        result
    }

    pub fn log_screen_view(&self, screen_class: &str, screen_title: &str) -> Result<(), TrackError> {
        let app = self.settings.app_info();
        self.append(Event::screen_view(&app, screen_class, screen_title, &[])?)
    }

    pub fn log_page_view(&self, screen_class: &str, screen_title: &str) -> Result<(), TrackError> {
        let app = self.settings.app_info();
        self.append(Event::page_view(
            &app.identifier,
            screen_class,
            screen_title,
            &[],
        )?)
    }

    pub fn log_session_start(&self) -> Result<(), TrackError> {
        let app = self.settings.app_info();
        self.append(Event::session(SessionControl::Start, &app.identifier, &[])?)
    }

    pub fn log_session_end(&self) -> Result<(), TrackError> {
        let app = self.settings.app_info();
        self.append(Event::session(SessionControl::End, &app.identifier, &[])?)
    }

    pub fn log_event(&self, event: &CustomEvent) -> Result<(), TrackError> {
        self.append(Event::custom(event, &[])?)
    }

    pub fn log_exception(&self, description: &str, fatal: bool) -> Result<(), TrackError> {
        self.append(Event::exception(description, fatal, &[])?)
    }

    /// Stop the timer, cut the final batch, and wait up to `grace` for every
    /// queued batch to be handed to the dispatcher.
    pub async fn shutdown(mut self, grace: Duration) -> Result<DeliveryCounts, ShutdownError> {
        self.cancel.cancel();
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.await;
        }
        let last = self.buffer.close();
        debug!(events = last, "final batch cut");

        let Some(mut worker) = self.worker.take() else {
            return Ok(self.stats.snapshot());
        };

        match tokio::time::timeout(grace, &mut worker).await {
            Ok(Ok(())) => Ok(self.stats.snapshot()),
            Ok(Err(e)) => {
                error!(error = %e, "delivery worker panicked");
                Err(ShutdownError::WorkerPanicked(e.to_string()))
            }
            Err(_) => {
                worker.abort();
                let counts = self.stats.snapshot();
                let abandoned = counts
                    .events_accepted
                    .saturating_sub(counts.events_delivered + counts.events_lost);
                self.stats.record_abandoned(abandoned);
                warn!(abandoned, ?grace, "shutdown grace elapsed, pending batches dropped");
                Err(ShutdownError::GraceElapsed { grace, abandoned })
            }
        }
    }
}

impl<D: Dispatch> Drop for Tracker<D> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.buffer.close();
    }
}
