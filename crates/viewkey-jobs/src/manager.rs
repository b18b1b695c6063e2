//! Job lifecycle: creation, background execution and polling.
//!
//! `create` registers a job and returns at once; a spawned worker drives the
//! scanning tool, classifies failures, and parses the report. `poll` hands out
//! snapshots and retires the job once a terminal snapshot has been delivered.

use crate::classify::{ClassifyContext, FailureClassifier, SubstringClassifier};
use crate::error::{JobError, Result};
use crate::invoker::{self, SyncInvoker, SyncRequest};
use crate::job::{
    lock_job, FailureKind, ImportReport, ImportRequest, Job, JobSnapshot, JobStatus, SharedJob,
};
use crate::progress::{run_estimator, ProgressSettings};
use crate::registry::JobRegistry;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use viewkey_core::{
    AppConfig, JobId, JobsConfig, PathsConfig, Timestamp, ViewKeyError, WalletSlug,
};
use viewkey_report::{parse_report, BirthdayFilter, FilterOutcome};
use zeroize::Zeroizing;

/// Attempts at deriving an unused job ID before giving up.
const MAX_ID_ATTEMPTS: u32 = 8;

/// Progress shown once the tool is running.
const SYNC_PROGRESS: u8 = 20;

const MSG_STARTING: &str = "Starting wallet sync…";
const MSG_SYNCING: &str = "Syncing wallet…";
const MSG_PARSING: &str = "Parsing results…";
const MSG_DONE: &str = "Done.";
const MSG_FAILED: &str = "Sync failed.";
const MSG_NO_OUTPUT: &str = "Sync failed (no output).";
const MSG_CRASHED: &str = "Sync crashed.";

/// How a worker ended.
enum Outcome {
    Done(ImportReport),
    Failed {
        message: &'static str,
        error: String,
        kind: FailureKind,
    },
}

impl Outcome {
    fn crashed(error: String) -> Self {
        Self::Failed {
            message: MSG_CRASHED,
            error,
            kind: FailureKind::WorkerFault,
        }
    }
}

/// Creates import jobs and answers polls.
#[derive(Clone)]
pub struct JobManager {
    registry: JobRegistry,
    invoker: Arc<dyn SyncInvoker>,
    classifier: Arc<dyn FailureClassifier>,
    paths: PathsConfig,
    jobs: JobsConfig,
    progress: ProgressSettings,
    server: String,
}

impl JobManager {
    /// Create a manager using `invoker` and the given configuration.
    #[must_use]
    pub fn new(invoker: Arc<dyn SyncInvoker>, config: &AppConfig) -> Self {
        Self {
            registry: JobRegistry::new(),
            invoker,
            classifier: Arc::new(SubstringClassifier),
            paths: config.paths.clone(),
            jobs: config.jobs.clone(),
            progress: ProgressSettings::from(&config.jobs),
            server: config.tool.server.clone(),
        }
    }

    /// Create a manager with the invoker the tool configuration selects.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(invoker::from_config(&config.tool), config)
    }

    /// Replace the failure classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// The registry this manager records jobs in.
    #[must_use]
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Register an import job and start it in the background.
    ///
    /// Returns as soon as the job is registered. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    /// Returns [`JobError::InvalidRequest`] for a zero birthday or one below
    /// the configured minimum.
    pub fn create(&self, request: ImportRequest) -> Result<JobId> {
        if request.birthday == 0 {
            return Err(JobError::InvalidRequest("Missing key or birthday".to_string()));
        }
        if let Some(min) = self.jobs.min_birthday_height {
            if request.birthday < min {
                return Err(JobError::InvalidRequest(format!(
                    "Birthday {} is below the minimum supported height {min}",
                    request.birthday
                )));
            }
        }

        let wallet_name = request
            .wallet_name
            .clone()
            .unwrap_or_else(|| self.jobs.default_wallet_name.clone());
        let (id, cell) = self.register(&request, &wallet_name)?;

        info!(job_id = %id, birthday = request.birthday, "queued import job");

        let manager = self.clone();
        tokio::spawn(async move {
            manager.drive(cell, request, wallet_name).await;
        });

        Ok(id)
    }

    /// Current snapshot of a job.
    ///
    /// A terminal snapshot is delivered once; afterwards the job is unknown.
    ///
    /// # Errors
    /// Returns [`JobError::NotFound`] for unknown or retired jobs.
    pub fn poll(&self, id: &JobId) -> Result<JobSnapshot> {
        self.registry
            .observe(id, &Timestamp::now())
            .ok_or_else(|| JobError::NotFound(id.clone()))
    }

    fn register(&self, request: &ImportRequest, wallet_name: &str) -> Result<(JobId, SharedJob)> {
        let nanos = Timestamp::now().timestamp_nanos();
        for attempt in 0..MAX_ID_ATTEMPTS {
            let seed = Zeroizing::new(
                format!(
                    "{}{}{}{nanos}{attempt}",
                    request.key.expose(),
                    request.birthday,
                    wallet_name
                )
                .into_bytes(),
            );
            let id = JobId::derive(&seed);
            match self.registry.insert(Job::new(id.clone())) {
                Ok(cell) => return Ok((id, cell)),
                Err(JobError::DuplicateId(taken)) => {
                    warn!(job_id = %taken, attempt, "job ID collision, re-deriving");
                }
                Err(e) => return Err(e),
            }
        }
        Err(ViewKeyError::Internal("could not derive an unused job ID".to_string()).into())
    }

    /// Run one job to a terminal state. Never panics past this point.
    async fn drive(self, cell: SharedJob, request: ImportRequest, wallet_name: String) {
        let id = {
            let mut job = lock_job(&cell);
            job.status = JobStatus::Running;
            job.message = MSG_STARTING.to_string();
            job.raise_progress(self.progress.start);
            job.id.clone()
        };

        let stop = CancellationToken::new();
        let estimator = tokio::spawn(run_estimator(Arc::clone(&cell), self.progress, stop.clone()));

        let body = {
            let manager = self.clone();
            let cell = Arc::clone(&cell);
            let stop = stop.clone();
            tokio::spawn(async move { manager.run_import(&cell, request, wallet_name, &stop).await })
        };

        let outcome = match body.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => Outcome::crashed(e.to_string()),
            Err(join) => Outcome::crashed(panic_message(join)),
        };

        stop.cancel();
        if let Err(e) = estimator.await {
            warn!(job_id = %id, "progress estimator ended abnormally: {}", e);
        }

        finish(&cell, outcome);
    }

    async fn run_import(
        &self,
        cell: &SharedJob,
        request: ImportRequest,
        wallet_name: String,
        stop: &CancellationToken,
    ) -> Result<Outcome> {
        let slug = WalletSlug::derive(&request.key);
        let birthday = request.birthday;
        let sync = SyncRequest {
            key: request.key,
            birthday,
            wallet_dir: self.paths.wallet_dir(&slug),
            wallet_name: wallet_name.clone(),
            output_prefix: self.paths.output_prefix(&slug),
        };

        let id = {
            let mut job = lock_job(cell);
            job.message = MSG_SYNCING.to_string();
            job.raise_progress(SYNC_PROGRESS);
            job.id.clone()
        };
        info!(job_id = %id, slug = %slug, birthday, "starting wallet sync");

        let output = self.invoker.invoke(&sync).await;
        stop.cancel();
        let output = output?;

        if !output.success() {
            let ctx = ClassifyContext {
                wallet_dir: &sync.wallet_dir,
                birthday,
                server: &self.server,
            };
            let failure = self.classifier.classify(&output, &ctx);
            warn!(job_id = %id, category = ?failure.category, exit_code = ?output.exit_code, "wallet sync failed");
            return Ok(Outcome::Failed {
                message: MSG_FAILED,
                error: failure.message,
                kind: failure.category.into(),
            });
        }

        {
            let mut job = lock_job(cell);
            job.message = MSG_PARSING.to_string();
            job.raise_progress(self.jobs.parsing_progress);
        }

        let report_path = sync.report_path();
        let Some(raw_text) = self.invoker.read_report(&sync).await? else {
            return Ok(Outcome::Failed {
                message: MSG_NO_OUTPUT,
                error: format!(
                    "The scanning tool finished but no report was written to {}",
                    report_path.display()
                ),
                kind: FailureKind::MissingOutput,
            });
        };

        let FilterOutcome {
            transactions,
            dropped,
        } = BirthdayFilter::new(Some(birthday)).apply(parse_report(&raw_text));
        debug!(job_id = %id, kept = transactions.len(), dropped, "parsed report");

        let file = report_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Outcome::Done(ImportReport {
            wallet_name,
            birthday,
            slug,
            file,
            raw_text,
            transactions,
            dropped_below_birthday: dropped,
        }))
    }
}

fn finish(cell: &SharedJob, outcome: Outcome) {
    let mut job = lock_job(cell);
    match outcome {
        Outcome::Done(report) => {
            info!(
                job_id = %job.id,
                transactions = report.transactions.len(),
                "import job done"
            );
            job.status = JobStatus::Done;
            job.progress = 100;
            job.message = MSG_DONE.to_string();
            job.result = Some(report);
        }
        Outcome::Failed {
            message,
            error: description,
            kind,
        } => {
            error!(job_id = %job.id, failure = ?kind, "{}", message);
            job.status = JobStatus::Failed;
            job.message = message.to_string();
            job.error = Some(description);
            job.failure = Some(kind);
        }
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "worker task was cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
