//! Runs the collector and the uploader and shuts both down together.

use std::{error::Error as StdError, future::Future, time::Duration};

use async_trait::async_trait;
use log::{error, info};
use tokio::{signal, time};

use super::{
    collector_task::{CollectorTask, Options as CollectorOptions},
    upload_task::{Options as UploadOptions, UploadTask},
};

/// A background task the supervisor can watch and stop.
#[async_trait]
pub trait ManagedTask: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_running(&self) -> bool;

    /// Request the task to stop and wait until it has finished. Must be idempotent.
    async fn stop(&self);
}

/// Why [`Supervisor::run`] returned.
#[derive(Clone, Debug, PartialEq)]
pub enum ExitReason {
    /// The shutdown future resolved (SIGINT or SIGTERM).
    Shutdown,
    /// The named task quit without being asked to.
    TaskQuit(&'static str),
}

pub struct Supervisor {
    tasks: Vec<Box<dyn ManagedTask>>,
    check_interval: Duration,
}

pub const DEF_CHECK_INTERVAL: Duration = Duration::from_secs(1);

impl Supervisor {
    /// Start the collector and then the uploader.
    pub async fn start(
        collector: CollectorOptions,
        uploader: UploadOptions,
    ) -> Result<Self, Box<dyn StdError>> {
        const FN_NAME: &'static str = "Supervisor::start";

        let collector = CollectorTask::new(collector)?;
        info!("[{}] collector started", FN_NAME);
        let uploader = match UploadTask::new(uploader) {
            Err(e) => {
                collector.stop().await;
                return Err(e);
            }
            Ok(uploader) => uploader,
        };
        info!("[{}] uploader started", FN_NAME);

        Ok(Supervisor::with_tasks(
            vec![Box::new(collector), Box::new(uploader)],
            DEF_CHECK_INTERVAL,
        ))
    }

    /// Supervise tasks that are already running.
    pub fn with_tasks(tasks: Vec<Box<dyn ManagedTask>>, check_interval: Duration) -> Self {
        Supervisor {
            tasks,
            check_interval,
        }
    }

    /// Watch the tasks until `shutdown` resolves or one of them quits, then stop all of them.
    pub async fn run<F>(&self, shutdown: F) -> ExitReason
    where
        F: Future<Output = ()>,
    {
        const FN_NAME: &'static str = "Supervisor::run";

        tokio::pin!(shutdown);
        let reason = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("[{}] shutdown requested", FN_NAME);
                    break ExitReason::Shutdown;
                }
                _ = time::sleep(self.check_interval) => {
                    if let Some(task) = self.tasks.iter().find(|task| !task.is_running()) {
                        error!("[{}] {} task quit", FN_NAME, task.name());
                        break ExitReason::TaskQuit(task.name());
                    }
                }
            }
        };
        self.stop_all().await;
        reason
    }

    /// Stop every task in start order.
    pub async fn stop_all(&self) {
        const FN_NAME: &'static str = "Supervisor::stop_all";

        info!("[{}] cleaning up...", FN_NAME);
        for task in self.tasks.iter() {
            task.stop().await;
            info!("[{}] {} stopped", FN_NAME, task.name());
        }
    }
}

/// Resolves on Ctrl-C, or on SIGTERM on Unix.
pub async fn shutdown_signal() {
    const FN_NAME: &'static str = "shutdown_signal";

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("[{}] listen Ctrl-C error: {}", FN_NAME, e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Err(e) => {
                error!("[{}] listen SIGTERM error: {}", FN_NAME, e);
                std::future::pending::<()>().await;
            }
            Ok(mut sig) => {
                sig.recv().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => (),
        _ = terminate => (),
    }
}
