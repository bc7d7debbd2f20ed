//! A stand-in Measurement Protocol collector for tests.
//!
//! Records every `GET /collect` and `POST /batch` it receives and answers
//! with a configurable status. `GET /received` drains the record as JSON so
//! the standalone binary can be inspected from outside the process.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CollectedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: String,
}

impl CollectedRequest {
    /// Raw (still encoded) value of the first `key` in the query string.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .as_deref()?
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// One entry per hit in a batch body.
    pub fn lines(&self) -> Vec<&str> {
        self.body.lines().collect()
    }
}

struct State {
    received: Vec<CollectedRequest>,
    status: StatusCode,
}

type Shared = Arc<Mutex<State>>;

pub struct Collector {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl Collector {
    /// Bind on an ephemeral loopback port.
    pub async fn start() -> io::Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await
    }

    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let state: Shared = Arc::new(Mutex::new(State {
            received: Vec::new(),
            status: StatusCode::OK,
        }));

        let task = tokio::spawn(accept_loop(listener, state.clone()));
        info!(%addr, "collector listening");

        Ok(Self { addr, state, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL to hand to the tracker; `collect` and `batch` resolve under it.
    pub fn endpoint(&self) -> String {
        format!("http://{}/", self.addr())
    }

    /// Answer every subsequent hit with `status`.
    pub fn respond_with(&self, status: u16) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        lock(&self.state).status = status;
    }

    /// Everything received so far, without clearing it.
    pub fn received(&self) -> Vec<CollectedRequest> {
        lock(&self.state).received.clone()
    }

    /// Wait until at least `min_expected` requests arrived or `timeout_ms`
    /// passed, then take them.
    pub async fn drain(&self, timeout_ms: u64, min_expected: usize) -> Vec<CollectedRequest> {
        let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_millis(timeout_ms);

        loop {
            if lock(&self.state).received.len() >= min_expected {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        lock(&self.state).received.drain(..).collect()
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock(state: &Shared) -> std::sync::MutexGuard<'_, State> {
    state
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

async fn accept_loop(listener: TcpListener, state: Shared) {
    loop {
        let stream = match listener.accept().await {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, state.clone()));
            if let Err(e) = Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!(error = %e, "connection closed with error");
            }
        });
    }
}

async fn handle<B>(req: Request<B>, state: Shared) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
{
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    match (&method, path.rsplit('/').next()) {
        (&Method::GET, Some("received")) => {
            let drained: Vec<CollectedRequest> = lock(&state).received.drain(..).collect();
            let body = serde_json::to_vec(&drained).unwrap_or_default();
            return Ok(respond(StatusCode::OK, Bytes::from(body)));
        }
        (&Method::GET, Some("collect")) | (&Method::POST, Some("batch")) => {}
        _ => {
            debug!(%method, %path, "unexpected request");
            return Ok(respond(StatusCode::NOT_FOUND, Bytes::new()));
        }
    }

    let query = req.uri().query().map(str::to_owned);
    let body = req
        .collect()
        .await
        .map(|c| c.to_bytes())
        .unwrap_or_default();

    let collected = CollectedRequest {
        method: method.to_string(),
        path,
        query,
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    info!(
        method = %collected.method,
        path = %collected.path,
        hits = collected.lines().len().max(1),
        "hit received"
    );

    let status = {
        let mut state = lock(&state);
        state.received.push(collected);
        state.status
    };

    Ok(respond(status, Bytes::new()))
}

fn respond(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
}
