//! Upload task publishes the shared reading to the ingestion API:
//! - Poll until every canonical field has been observed once.
//! - POST the current snapshot, then wait for the upload interval and repeat.
//!
//! Uploads are best effort. Failures are logged and the next tick sends whatever the reading
//! holds by then.

use std::{
    error::Error as StdError,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::Client;
use serde_json::Value;
use tokio::{
    task::{self, JoinHandle},
    time,
};
use tokio_util::sync::CancellationToken;

use super::{reading::SharedReading, supervisor::ManagedTask};

/// Header carrying the station API key.
pub const API_KEY_HEADER: &'static str = "X-Api-Key";

pub struct Options {
    pub url: String,
    pub api_key: String,
    /// Wait between the end of one upload and the start of the next.
    pub upload_interval: Duration,
    /// Wait between complete reading checks before the first upload.
    pub poll_interval: Duration,
    pub reading: SharedReading,
}

#[derive(Clone)]
pub struct UploadTask {
    opts: OptionsInner,
    client: Client,
    reading: SharedReading,

    cancel: CancellationToken,
    task_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

#[derive(Clone)]
struct OptionsInner {
    url: String,
    api_key: String,
    upload_interval: Duration,
    poll_interval: Duration,
}

impl UploadTask {
    /// Create the task and start it in the background.
    pub fn new(opts: Options) -> Result<Self, Box<dyn StdError>> {
        let client = Client::builder().build()?;

        let task = UploadTask {
            opts: OptionsInner {
                url: opts.url,
                api_key: opts.api_key,
                upload_interval: opts.upload_interval,
                poll_interval: opts.poll_interval,
            },
            client,
            reading: opts.reading,
            cancel: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        };
        {
            *task.task_handle.lock().unwrap() = Some(create_event_loop(task.clone()));
        }
        Ok(task)
    }

    /// Returns `true` while the event loop is alive.
    pub fn is_running(&self) -> bool {
        match self.task_handle.lock().unwrap().as_ref() {
            None => false,
            Some(handle) => !handle.is_finished(),
        }
    }

    /// Interrupt the current wait and wait for the event loop to finish. An upload in flight is
    /// not interrupted.
    pub async fn stop(&self) {
        const FN_NAME: &'static str = "UploadTask::stop";

        self.cancel.cancel();
        let handle = { self.task_handle.lock().unwrap().take() };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("[{}] join upload task error: {}", FN_NAME, e);
            }
        }
    }
}

#[async_trait]
impl ManagedTask for UploadTask {
    fn name(&self) -> &'static str {
        "uploader"
    }

    fn is_running(&self) -> bool {
        UploadTask::is_running(self)
    }

    async fn stop(&self) {
        UploadTask::stop(self).await
    }
}

/// To create an event loop runtime task.
fn create_event_loop(task: UploadTask) -> JoinHandle<()> {
    task::spawn(async move {
        const FN_NAME: &'static str = "UploadTask::event_loop";

        info!("[{}] waiting for a complete reading", FN_NAME);
        while !task.reading.is_complete() {
            tokio::select! {
                biased;
                _ = task.cancel.cancelled() => {
                    info!("[{}] uploader stopped before the first upload", FN_NAME);
                    return;
                }
                _ = time::sleep(task.opts.poll_interval) => (),
            }
        }

        info!("[{}] reading complete, start uploading", FN_NAME);
        loop {
            upload(&task).await;
            tokio::select! {
                biased;
                _ = task.cancel.cancelled() => break,
                _ = time::sleep(task.opts.upload_interval) => (),
            }
        }
        info!("[{}] uploader stopped", FN_NAME);
    })
}

/// Send the current snapshot once and log the outcome.
async fn upload(task: &UploadTask) {
    const FN_NAME: &'static str = "upload";

    let snapshot = task.reading.snapshot();
    debug!(
        "[{}] uploading: {}",
        FN_NAME,
        Value::Object(snapshot.clone())
    );
    let resp = match task
        .client
        .post(task.opts.url.as_str())
        .header(API_KEY_HEADER, task.opts.api_key.as_str())
        .json(&snapshot)
        .send()
        .await
    {
        Err(e) => {
            error!("[{}] send to {} error: {}", FN_NAME, task.opts.url, e);
            return;
        }
        Ok(resp) => resp,
    };
    let status = resp.status();
    let body = match resp.text().await {
        Err(e) => format!("(read body error: {})", e),
        Ok(body) => body,
    };
    match status.is_success() {
        true => info!("[{}] result: {} - {}", FN_NAME, status, body),
        false => warn!("[{}] rejected: {} - {}", FN_NAME, status, body),
    }
}
