use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use reqwest::StatusCode;

use crate::config::{AppInfo, DeviceInfo, TrackerConfig, TrackerProfile};
use crate::dispatcher::{Dispatch, DispatchError};
use crate::event::Event;

/// Records everything it is asked to send and always succeeds.
#[derive(Default)]
pub struct RecordingDispatcher {
    batches: Mutex<Vec<Vec<Event>>>,
    singles: Mutex<Vec<Event>>,
}

impl RecordingDispatcher {
    pub fn batches(&self) -> Vec<Vec<Event>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn singles(&self) -> Vec<Event> {
        self.singles.lock().unwrap().clone()
    }
}

impl Dispatch for RecordingDispatcher {
    async fn send_event(&self, event: &Event) -> Result<(), DispatchError> {
        self.singles.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn send_batch(&self, events: &[Event]) -> Result<(), DispatchError> {
        self.batches.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

/// Every send is rejected with a 500.
#[derive(Default)]
pub struct FailingDispatcher {
    attempts: AtomicU32,
}

impl FailingDispatcher {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Dispatch for FailingDispatcher {
    async fn send_event(&self, _event: &Event) -> Result<(), DispatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DispatchError::Rejected {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        })
    }

    async fn send_batch(&self, _events: &[Event]) -> Result<(), DispatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DispatchError::Rejected {
            status: StatusCode::INTERNAL_SERVER_ERROR,
        })
    }
}

/// Never completes a send.
pub struct StuckDispatcher;

impl Dispatch for StuckDispatcher {
    async fn send_event(&self, _event: &Event) -> Result<(), DispatchError> {
        std::future::pending().await
    }

    async fn send_batch(&self, _events: &[Event]) -> Result<(), DispatchError> {
        std::future::pending().await
    }
}

pub fn dummy_config(max_batch_events: usize, flush_interval_ms: u64) -> TrackerConfig {
    TrackerConfig {
        endpoint: url::Url::parse("http://127.0.0.1:9/").unwrap(),
        max_batch_events,
        flush_interval: std::time::Duration::from_millis(flush_interval_ms),
        collect_timeout: std::time::Duration::from_millis(100),
        batch_timeout: std::time::Duration::from_millis(100),
        profile: TrackerProfile {
            tracker_id: Some("UA-TEST-1".into()),
            anonymize_ip: true,
            client_id: "client-1".into(),
            user_agent: "custom".into(),
            app: AppInfo {
                name: "Demo".into(),
                identifier: "com.example.demo".into(),
                version: "1.0".into(),
                build: "1".into(),
            },
            device: DeviceInfo::default(),
        },
    }
}
