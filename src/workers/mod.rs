pub mod aggregation;
pub mod queue_poll;
pub mod report_build;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::{AlertConfig, Config, WorkerConfig};
use crate::constants::{STARTUP_REPORT_DELAY_SECS, WORKER_JOB_TIMEOUT_SECS};
use crate::services::queue_source::HttpQueueSource;
use crate::services::webhook::WebhookNotifier;
use crate::store::Store;

const WORKER_TIMEOUT: Duration = Duration::from_secs(WORKER_JOB_TIMEOUT_SECS);

/// Drain period before scheduler shutdown to let in-flight tasks complete.
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    QueuePoll,
    ReportBuild,
    Aggregation,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QueuePoll => "queue_poll",
            Self::ReportBuild => "report_build",
            Self::Aggregation => "aggregation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: String,
    pub enabled: bool,
}

pub struct WorkerManager {
    store: Arc<Store>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
    alerting: Arc<AlertConfig>,
    queue_source: Arc<HttpQueueSource>,
    notifier: Arc<WebhookNotifier>,
    /// Poll minute offset (0-4) so instances do not hit the queue in the same minute.
    poll_offset_minute: u32,
}

impl WorkerManager {
    pub fn new(store: Arc<Store>, shutdown_rx: broadcast::Receiver<()>, config: &Config) -> Self {
        Self {
            store,
            shutdown_rx,
            config: config.worker.clone(),
            alerting: Arc::new(config.alerting.clone()),
            queue_source: Arc::new(HttpQueueSource::new(&config.queue_source)),
            notifier: Arc::new(WebhookNotifier::new(&config.alerting)),
            poll_offset_minute: rand::thread_rng().gen_range(0..5),
        }
    }

    /// Single source of truth for all planned jobs and their cron schedules (UTC).
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::QueuePoll,
                cron: format!("0 {}/5 * * * *", self.poll_offset_minute),
                enabled: self.queue_source.is_configured(),
            },
            JobSpec {
                name: WorkerName::ReportBuild,
                cron: "0 1 0 * * *".to_string(),
                enabled: true,
            },
            JobSpec {
                name: WorkerName::Aggregation,
                cron: "0 0 5 * * *".to_string(),
                enabled: true,
            },
        ]
    }

    /// Start the worker scheduler. Returns an error if the scheduler cannot be created or started.
    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;

        self.register_jobs(&scheduler).await;

        scheduler.start().await?;
        tracing::info!("Worker manager started");

        if self.config.report_on_startup {
            self.spawn_startup_report();
        }

        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            "Worker manager shutting down, draining for {}s",
            DRAIN_TIMEOUT.as_secs()
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    fn spawn_startup_report(&self) {
        let store = self.store.clone();
        let mut shutdown_rx = self.shutdown_rx.resubscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(STARTUP_REPORT_DELAY_SECS)) => {
                    report_build::run(&store).await;
                }
                _ = shutdown_rx.recv() => {}
            }
        });
    }

    /// Register all jobs with the scheduler, using `planned_jobs()` as the single source of truth.
    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in self.planned_jobs() {
            let name_str = spec.name.as_str();
            if !spec.enabled {
                tracing::info!(name = name_str, "Skipping disabled worker");
                continue;
            }

            let store = self.store.clone();

            match spec.name {
                WorkerName::QueuePoll => {
                    let source = self.queue_source.clone();
                    let notifier = self.notifier.clone();
                    let alerting = self.alerting.clone();
                    add_job(scheduler, &spec.cron, name_str, move || {
                        let store = store.clone();
                        let source = source.clone();
                        let notifier = notifier.clone();
                        let alerting = alerting.clone();
                        async move {
                            queue_poll::run(&store, source.as_ref(), notifier.as_ref(), &alerting)
                                .await;
                        }
                    })
                    .await;
                }
                WorkerName::ReportBuild => {
                    add_job(scheduler, &spec.cron, name_str, move || {
                        let store = store.clone();
                        async move {
                            report_build::run(&store).await;
                        }
                    })
                    .await;
                }
                WorkerName::Aggregation => {
                    add_job(scheduler, &spec.cron, name_str, move || {
                        let store = store.clone();
                        async move {
                            aggregation::run(&store).await;
                        }
                    })
                    .await;
                }
            }
            tracing::info!(name = name_str, cron = %spec.cron, "Registered worker");
        }
    }
}

/// Add a job to the scheduler with an overlap guard and timeout wrapper.
async fn add_job<Fut, F>(scheduler: &JobScheduler, cron: &str, name: &'static str, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                worker = name,
                "Skipping worker invocation: previous run still in progress"
            );
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    });

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error = %err, cron, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => tracing::error!(error = %err, cron, worker = name, "Failed to create worker job"),
    }
}
