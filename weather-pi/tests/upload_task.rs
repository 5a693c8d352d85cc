use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio::time;

use weather_pi::libs::{
    reading::{CanonicalField, SharedReading},
    upload_task::{Options, UploadTask},
};

mod common;

use common::{MockApi, closed_url, wait_until, within};

const TIMEOUT: Duration = Duration::from_secs(5);
const API_KEY: &'static str = "0123456789abcdef0123456789abcdef";

fn almost_complete() -> SharedReading {
    let reading = SharedReading::new();
    reading.merge(vec![
        (CanonicalField::BroadcastedStationId, json!(7)),
        (CanonicalField::Battery, json!(true)),
        (CanonicalField::Timestamp, json!(1759694121)),
        (CanonicalField::Temperature, json!(18.5)),
        (CanonicalField::Humidity, json!(60)),
        (CanonicalField::WindSpeed, json!(2.25)),
        (CanonicalField::WindDir, json!(202)),
        (CanonicalField::WindGust, json!(3.5)),
    ]);
    reading
}

fn complete() -> SharedReading {
    let reading = almost_complete();
    reading.set_field(CanonicalField::Rain, json!(12.75));
    reading
}

fn new_task(url: String, reading: SharedReading, upload_interval: Duration) -> UploadTask {
    UploadTask::new(Options {
        url,
        api_key: API_KEY.to_string(),
        upload_interval,
        poll_interval: Duration::from_millis(20),
        reading,
    })
    .unwrap()
}

#[tokio::test]
async fn no_upload_before_complete() {
    let api = MockApi::start(StatusCode::CREATED).await;
    let reading = almost_complete();
    let task = new_task(api.url.clone(), reading.clone(), Duration::from_millis(100));

    time::sleep(Duration::from_millis(300)).await;
    assert_eq!(api.count(), 0);
    assert!(task.is_running());

    reading.set_field(CanonicalField::Rain, json!(0.0));
    assert!(wait_until(|| api.count() >= 1, TIMEOUT).await);

    let first = &api.requests()[0];
    assert_eq!(first.api_key.as_deref(), Some(API_KEY));
    assert_eq!(first.body.len(), 9);
    assert_eq!(first.body["broadcasted_station_id"], json!(7));
    assert_eq!(first.body["battery"], json!(true));
    assert_eq!(first.body["rain"], json!(0.0));

    within(TIMEOUT, task.stop()).await;
    assert!(!task.is_running());
}

#[tokio::test]
async fn fixed_interval_after_each_attempt() {
    let api = MockApi::start(StatusCode::CREATED).await;
    let interval = Duration::from_millis(200);
    let task = new_task(api.url.clone(), complete(), interval);

    assert!(wait_until(|| api.count() >= 4, TIMEOUT).await);
    within(TIMEOUT, task.stop()).await;

    let requests = api.requests();
    for pair in requests.windows(2) {
        let gap = pair[1].at.duration_since(pair[0].at);
        assert!(gap >= interval - Duration::from_millis(10), "gap {:?}", gap);
    }
}

#[tokio::test]
async fn sends_latest_snapshot() {
    let api = MockApi::start(StatusCode::CREATED).await;
    let reading = complete();
    let task = new_task(api.url.clone(), reading.clone(), Duration::from_millis(100));

    assert!(wait_until(|| api.count() >= 1, TIMEOUT).await);
    reading.set_field(CanonicalField::Temperature, json!(21.5));
    assert!(
        wait_until(
            || {
                api.requests()
                    .last()
                    .map(|r| r.body["temperature"] == json!(21.5))
                    .unwrap_or(false)
            },
            TIMEOUT
        )
        .await
    );
    within(TIMEOUT, task.stop()).await;
}

#[tokio::test]
async fn rejected_upload_keeps_running() {
    let api = MockApi::start(StatusCode::UNAUTHORIZED).await;
    let task = new_task(api.url.clone(), complete(), Duration::from_millis(50));

    assert!(wait_until(|| api.count() >= 3, TIMEOUT).await);
    assert!(task.is_running());
    within(TIMEOUT, task.stop()).await;
}

#[tokio::test]
async fn unreachable_endpoint_keeps_running() {
    let task = new_task(closed_url().await, complete(), Duration::from_millis(50));

    time::sleep(Duration::from_millis(300)).await;
    assert!(task.is_running());
    within(TIMEOUT, task.stop()).await;
    assert!(!task.is_running());
}

#[tokio::test]
async fn stop_before_first_upload() {
    let api = MockApi::start(StatusCode::CREATED).await;
    let task = new_task(api.url.clone(), SharedReading::new(), Duration::from_secs(60));

    time::sleep(Duration::from_millis(100)).await;
    within(Duration::from_secs(1), task.stop()).await;
    assert!(!task.is_running());
    assert_eq!(api.count(), 0);
}

#[tokio::test]
async fn stop_interrupts_interval_wait() {
    let api = MockApi::start(StatusCode::CREATED).await;
    let task = new_task(api.url.clone(), complete(), Duration::from_secs(60));

    assert!(wait_until(|| api.count() == 1, TIMEOUT).await);
    within(Duration::from_secs(1), task.stop()).await;
    assert!(!task.is_running());
    assert_eq!(api.count(), 1);
}
