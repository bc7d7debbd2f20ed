use std::net::SocketAddr;

use tracing::{error, info};

use test_collector::Collector;

const DEFAULT_PORT: u16 = 8089;

fn setup_logging() {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let level = std::env::var("TEST_COLLECTOR_LOG_LEVEL")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(level)
        .with(tracing_microjson::JsonLayer::new(std::io::stdout).with_target(true))
        .init();
}

#[tokio::main]
async fn main() {
    setup_logging();

    let port = std::env::var("TEST_COLLECTOR_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let collector = match Collector::bind(SocketAddr::from(([127, 0, 0, 1], port))).await {
        Ok(collector) => collector,
        Err(e) => {
            error!(error = %e, port, "failed to bind collector");
            std::process::exit(1);
        }
    };
    info!(endpoint = %collector.endpoint(), "point GA_TRACKER_ENDPOINT here");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to wait for ctrl-c");
    }
    info!(
        unread = collector.received().len(),
        "collector shutting down"
    );
}
