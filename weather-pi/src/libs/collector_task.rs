//! Collector task owns the receiver process and feeds the shared reading:
//! - Launch the receiver command with stdout captured.
//! - Parse each output line as one JSON object and normalize it.
//! - Merge the normalized fields into the shared reading.

use std::{
    error::Error as StdError,
    fmt,
    io::{Error as IoError, ErrorKind},
    process::Stdio,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    task::{self, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use super::{
    config,
    field_mapper,
    reading::{PartialReading, SharedReading},
    supervisor::ManagedTask,
};

pub struct Options {
    /// Receiver command line. Arguments are separated by spaces.
    pub cmd: String,
    pub reading: SharedReading,
}

#[derive(Clone)]
pub struct CollectorTask {
    args: Vec<String>,
    reading: SharedReading,

    cancel: CancellationToken,
    task_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Why one output line did not update the reading.
#[derive(Debug)]
pub enum LineError {
    /// Not JSON at all. Receivers interleave diagnostics with data so this is expected.
    Json(serde_json::Error),
    /// Valid JSON that is not an object.
    NotObject,
    /// A JSON object with a known key that cannot be normalized.
    Mapping(IoError),
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::Json(e) => write!(f, "not JSON: {}", e),
            LineError::NotObject => write!(f, "not a JSON object"),
            LineError::Mapping(e) => write!(f, "mapping error: {}", e),
        }
    }
}

impl StdError for LineError {}

impl CollectorTask {
    /// Create the task and start it in the background.
    ///
    /// The receiver process is launched by the task itself so a launch failure ends the task
    /// instead of this function.
    pub fn new(opts: Options) -> Result<Self, Box<dyn StdError>> {
        let args = config::split_cmd(opts.cmd.as_str());
        if args.is_empty() {
            return Err(Box::new(IoError::new(
                ErrorKind::InvalidInput,
                "empty receiver command",
            )));
        }

        let task = CollectorTask {
            args,
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

    /// Kill the receiver process and wait for the event loop to finish. Calling this more than
    /// once or after the task has quit is harmless.
    pub async fn stop(&self) {
        const FN_NAME: &'static str = "CollectorTask::stop";

        self.cancel.cancel();
        let handle = { self.task_handle.lock().unwrap().take() };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("[{}] join collector task error: {}", FN_NAME, e);
            }
        }
    }
}

#[async_trait]
impl ManagedTask for CollectorTask {
    fn name(&self) -> &'static str {
        "collector"
    }

    fn is_running(&self) -> bool {
        CollectorTask::is_running(self)
    }

    async fn stop(&self) {
        CollectorTask::stop(self).await
    }
}

/// Parse and normalize one line of receiver output.
pub fn parse_line(line: &[u8]) -> Result<PartialReading, LineError> {
    let raw = match serde_json::from_slice::<Value>(line) {
        Err(e) => return Err(LineError::Json(e)),
        Ok(Value::Object(raw)) => raw,
        Ok(_) => return Err(LineError::NotObject),
    };
    field_mapper::normalize(&raw).map_err(LineError::Mapping)
}

fn spawn_receiver(args: &[String]) -> Result<Child, IoError> {
    Command::new(args[0].as_str())
        .args(&args[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
}

/// To create an event loop runtime task.
fn create_event_loop(task: CollectorTask) -> JoinHandle<()> {
    task::spawn(async move {
        const FN_NAME: &'static str = "CollectorTask::event_loop";

        info!("[{}] starting receiver: {}", FN_NAME, task.args.join(" "));
        let mut child = match spawn_receiver(task.args.as_slice()) {
            Err(e) => {
                error!("[{}] launch receiver {} error: {}", FN_NAME, task.args[0], e);
                return;
            }
            Ok(child) => child,
        };
        let stdout = match child.stdout.take() {
            None => {
                error!("[{}] receiver stdout is not captured", FN_NAME);
                if let Err(e) = child.kill().await {
                    error!("[{}] kill receiver error: {}", FN_NAME, e);
                }
                return;
            }
            Some(stdout) => stdout,
        };
        let mut reader = BufReader::new(stdout);
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = tokio::select! {
                biased;
                _ = task.cancel.cancelled() => {
                    info!("[{}] stop requested, killing receiver", FN_NAME);
                    if let Err(e) = child.kill().await {
                        error!("[{}] kill receiver error: {}", FN_NAME, e);
                    }
                    break;
                }
                read = reader.read_until(b'\n', &mut line) => read,
            };
            match read {
                Err(e) => {
                    error!("[{}] read receiver output error: {}", FN_NAME, e);
                    if let Err(e) = child.kill().await {
                        error!("[{}] kill receiver error: {}", FN_NAME, e);
                    }
                    break;
                }
                Ok(0) => {
                    match child.wait().await {
                        Err(e) => error!("[{}] wait receiver error: {}", FN_NAME, e),
                        Ok(status) => warn!("[{}] receiver exited with {}", FN_NAME, status),
                    }
                    break;
                }
                Ok(_) => (),
            }

            match parse_line(line.as_slice()) {
                Err(LineError::Mapping(e)) => {
                    error!("[{}] skip line: {}", FN_NAME, e);
                }
                Err(e) => {
                    debug!("[{}] skip line: {}", FN_NAME, e);
                }
                Ok(update) => {
                    task.reading.merge(update);
                    debug!(
                        "[{}] got: {}",
                        FN_NAME,
                        Value::Object(task.reading.snapshot())
                    );
                }
            }
        }
        info!("[{}] collector stopped", FN_NAME);
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::libs::reading::CanonicalField;

    #[test]
    fn line_outcomes() {
        let update = parse_line(b"{\"id\": 7, \"humidity\": 55}\n").unwrap();
        assert_eq!(
            update,
            vec![
                (CanonicalField::BroadcastedStationId, json!(7)),
                (CanonicalField::Humidity, json!(55)),
            ]
        );

        assert!(matches!(
            parse_line(b"Tuned to 868.300MHz.\n"),
            Err(LineError::Json(_))
        ));
        assert!(matches!(parse_line(b"{\"id\": 7"), Err(LineError::Json(_))));
        assert!(matches!(parse_line(b"\n"), Err(LineError::Json(_))));
        assert!(matches!(parse_line(b"[1, 2]\n"), Err(LineError::NotObject)));
        assert!(matches!(
            parse_line(b"{\"time\": \"05/10/2025\"}\n"),
            Err(LineError::Mapping(_))
        ));
        assert!(matches!(
            parse_line(&[0xff, 0xfe, b'\n']),
            Err(LineError::Json(_))
        ));
    }

    #[tokio::test]
    async fn empty_command() {
        let result = CollectorTask::new(Options {
            cmd: "  ".to_string(),
            reading: SharedReading::new(),
        });
        assert!(result.is_err());
    }
}
