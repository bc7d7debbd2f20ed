use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::TrackerConfig;
use crate::event::Event;
use crate::settings::{Settings, SettingsError};

pub mod wire;

/// Sends hits to the collector. The buffer never calls this directly; the
/// delivery worker does, one batch at a time.
pub trait Dispatch: Send + Sync + 'static {
    fn send_event(&self, event: &Event) -> impl Future<Output = Result<(), DispatchError>> + Send;
    fn send_batch(&self, events: &[Event])
    -> impl Future<Output = Result<(), DispatchError>> + Send;
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("tracker not ready: {0}")]
    Config(#[from] SettingsError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector rejected hit: {status}")]
    Rejected { status: StatusCode },
}

impl DispatchError {
    /// True when the failure happened before any request was issued.
    pub fn is_config(&self) -> bool {
        matches!(self, DispatchError::Config(_))
    }
}

/// Measurement Protocol client: GET `collect` for single hits, POST `batch`
/// for buffered ones.
pub struct HttpDispatcher {
    client: Client,
    collect_url: Url,
    batch_url: Url,
    collect_timeout: Duration,
    batch_timeout: Duration,
    settings: Settings,
}

impl HttpDispatcher {
    pub fn new(config: &TrackerConfig, settings: Settings) -> Result<Self, DispatchError> {
        // Already installed is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client = Client::builder().build()?;
        let (collect_url, batch_url) = endpoints(&config.endpoint);

        Ok(Self {
            client,
            collect_url,
            batch_url,
            collect_timeout: config.collect_timeout,
            batch_timeout: config.batch_timeout,
            settings,
        })
    }

    pub fn collect_url(&self) -> &Url {
        &self.collect_url
    }

    pub fn batch_url(&self) -> &Url {
        &self.batch_url
    }
}

fn endpoints(base: &Url) -> (Url, Url) {
    let mut collect = base.clone();
    let mut batch = base.clone();
    if let Ok(mut segments) = collect.path_segments_mut() {
        segments.pop_if_empty().push("collect");
    }
    if let Ok(mut segments) = batch.path_segments_mut() {
        segments.pop_if_empty().push("batch");
    }
    (collect, batch)
}

/// Only a 200 counts as delivered.
fn check_status(status: StatusCode) -> Result<(), DispatchError> {
    if status == StatusCode::OK {
        Ok(())
    } else {
        Err(DispatchError::Rejected { status })
    }
}

impl Dispatch for HttpDispatcher {
    async fn send_event(&self, event: &Event) -> Result<(), DispatchError> {
        let common = self.settings.common_parameters()?;
        let url = wire::collect_url(&self.collect_url, &common, event);

        let resp = self
            .client
            .get(url)
            .timeout(self.collect_timeout)
            .send()
            .await?;
        check_status(resp.status())?;

        debug!(hit_type = ?event.hit_type(), "sent single hit");
        Ok(())
    }

    async fn send_batch(&self, events: &[Event]) -> Result<(), DispatchError> {
        let common = self.settings.common_parameters()?;
        if events.is_empty() {
            return Ok(());
        }
        let body = Bytes::from(wire::batch_body(&common, events));

        let resp = self
            .client
            .post(self.batch_url.clone())
            .timeout(self.batch_timeout)
            .body(body)
            .send()
            .await?;
        check_status(resp.status())?;

        debug!(events = events.len(), "sent batch");
        Ok(())
    }
}
