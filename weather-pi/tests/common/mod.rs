#![allow(dead_code)]

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing,
};
use chrono::{Local, NaiveDateTime, TimeZone};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, time};

/// Receiver output with diagnostics, broken lines and two Bresser 6-in-1 messages.
pub fn fixture(name: &str) -> String {
    format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), name)
}

pub fn local_epoch(s: &str) -> i64 {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap()
        .timestamp()
}

/// Poll `cond` every 10 ms. Returns `false` on timeout.
pub async fn wait_until<F>(cond: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while !cond() {
        if start.elapsed() > timeout {
            return false;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    true
}

/// Run `fut` with a timeout and panic if it takes longer.
pub async fn within<F: Future>(timeout: Duration, fut: F) -> F::Output {
    match time::timeout(timeout, fut).await {
        Err(_) => panic!("not finished within {:?}", timeout),
        Ok(out) => out,
    }
}

/// One request received by the mock ingestion endpoint.
#[derive(Clone, Debug)]
pub struct Received {
    pub api_key: Option<String>,
    pub body: Map<String, Value>,
    pub at: Instant,
}

#[derive(Clone)]
pub struct MockApi {
    pub url: String,
    pub received: Arc<Mutex<Vec<Received>>>,
    status: StatusCode,
}

impl MockApi {
    /// Start an ingestion endpoint on a random local port answering every POST with `status`.
    pub async fn start(status: StatusCode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let api = MockApi {
            url: format!("http://{}/api/v1/data", addr),
            received: Arc::new(Mutex::new(vec![])),
            status,
        };
        let app = Router::new()
            .route("/api/v1/data", routing::post(post_data))
            .with_state(api.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        api
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn post_data(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Json(body): Json<Map<String, Value>>,
) -> StatusCode {
    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    api.received.lock().unwrap().push(Received {
        api_key,
        body,
        at: Instant::now(),
    });
    api.status
}

/// An URL where nothing is listening.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/v1/data", addr)
}
