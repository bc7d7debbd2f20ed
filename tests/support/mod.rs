#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ga_tracker::{
    AppInfo, DeliveryCallback, DeliveryReport, FlushTrigger, Tracker, TrackerConfig,
};
use test_collector::Collector;
use tokio::sync::mpsc;
use url::Url;

pub const TRACKER_ID: &str = "UA-IT-1";
pub const LINE_PREFIX: &str = "v=1&tid=UA-IT-1&aid=com.example.it&cid=it-client&an=Demo&";

/// What the delivery callback saw for one batch.
#[derive(Debug)]
pub struct Seen {
    pub seq: u64,
    pub trigger: FlushTrigger,
    pub events: usize,
    pub delivered: bool,
    pub config_error: bool,
}

pub struct Harness {
    pub collector: Collector,
    pub tracker: Tracker,
    reports: mpsc::UnboundedReceiver<Seen>,
}

pub struct HarnessBuilder {
    max_batch_events: usize,
    flush_interval: Duration,
    tracker_id: Option<String>,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            max_batch_events: 20,
            flush_interval: Duration::from_secs(60),
            tracker_id: Some(TRACKER_ID.into()),
        }
    }

    /// Next delivery report, or panic after `timeout_ms`.
    pub async fn next_report(&mut self, timeout_ms: u64) -> Seen {
        tokio::time::timeout(Duration::from_millis(timeout_ms), self.reports.recv())
            .await
            .expect("no delivery report in time")
            .expect("delivery worker gone")
    }
}

impl HarnessBuilder {
    pub fn max_batch_events(mut self, n: usize) -> Self {
        self.max_batch_events = n;
        self
    }

    pub fn flush_interval_ms(mut self, ms: u64) -> Self {
        self.flush_interval = Duration::from_millis(ms);
        self
    }

    pub fn without_tracker_id(mut self) -> Self {
        self.tracker_id = None;
        self
    }

    pub async fn start(self) -> Harness {
        let collector = Collector::start().await.expect("collector should bind");

        let mut config = TrackerConfig {
            endpoint: Url::parse(&collector.endpoint()).unwrap(),
            max_batch_events: self.max_batch_events,
            flush_interval: self.flush_interval,
            ..TrackerConfig::default()
        };
        config.profile.tracker_id = self.tracker_id;
        config.profile.client_id = "it-client".into();
        config.profile.app = AppInfo {
            name: "Demo".into(),
            identifier: "com.example.it".into(),
            version: "1.0".into(),
            build: "7".into(),
        };

        let (tx, reports) = mpsc::unbounded_channel();
        let callback: DeliveryCallback = Arc::new(move |report: &DeliveryReport| {
            let _ = tx.send(Seen {
                seq: report.seq,
                trigger: report.trigger,
                events: report.events,
                delivered: report.is_delivered(),
                config_error: report.outcome.as_ref().is_err_and(|e| e.is_config()),
            });
        });

        let tracker = Tracker::start(&config, Some(callback)).expect("tracker should start");
        Harness {
            collector,
            tracker,
            reports,
        }
    }
}
