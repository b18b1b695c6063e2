//! Job records, import requests and the payloads returned to pollers.

use crate::classify::FailureCategory;
use crate::error::{JobError, Result};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use viewkey_core::{BirthdayHeight, JobId, Timestamp, ViewingKey, WalletSlug};
use viewkey_report::Transaction;

/// Lifecycle state of an import job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Registered, worker not yet started
    Queued,
    /// Worker is running the scanning tool or parsing its report
    Running,
    /// Finished with a result
    Done,
    /// Finished with an error
    Failed,
}

impl JobStatus {
    /// Done and failed are terminal; nothing changes a job after either.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Why a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The server cannot serve tree state at the requested birthday
    BirthdayUnsupported,
    /// Another process holds the wallet store
    StoreLocked,
    /// The wallet directory is missing files
    CorruptedWalletDir,
    /// The tool failed for a reason we do not recognize
    UnknownToolFailure,
    /// The tool reported success but wrote no report
    MissingOutput,
    /// The worker itself faulted
    WorkerFault,
}

impl From<FailureCategory> for FailureKind {
    fn from(category: FailureCategory) -> Self {
        match category {
            FailureCategory::BirthdayUnsupported => Self::BirthdayUnsupported,
            FailureCategory::StoreLocked => Self::StoreLocked,
            FailureCategory::CorruptedWalletDir => Self::CorruptedWalletDir,
            FailureCategory::UnknownToolFailure => Self::UnknownToolFailure,
        }
    }
}

/// A request to import one viewing key.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Secret key material
    pub key: ViewingKey,
    /// Scan start height
    pub birthday: BirthdayHeight,
    /// Wallet label; the configured default is used when unset
    pub wallet_name: Option<String>,
}

impl ImportRequest {
    /// Create a request with the default wallet label.
    #[must_use]
    pub fn new(key: ViewingKey, birthday: BirthdayHeight) -> Self {
        Self {
            key,
            birthday,
            wallet_name: None,
        }
    }

    /// Set the wallet label.
    #[must_use]
    pub fn with_wallet_name(mut self, name: impl Into<String>) -> Self {
        self.wallet_name = Some(name.into());
        self
    }

    /// Build a request from loosely typed input, as a request handler sees it.
    ///
    /// A blank key, a missing birthday and a zero birthday are all rejected.
    /// A blank wallet name counts as unset.
    pub fn from_raw(
        view_key: Option<&str>,
        birthday: Option<BirthdayHeight>,
        wallet_name: Option<&str>,
    ) -> Result<Self> {
        let key = view_key.map(str::trim).filter(|k| !k.is_empty());
        let birthday = birthday.filter(|b| *b > 0);
        let (Some(key), Some(birthday)) = (key, birthday) else {
            return Err(JobError::InvalidRequest("Missing key or birthday".to_string()));
        };

        let mut request = Self::new(ViewingKey::new(key)?, birthday);
        if let Some(name) = wallet_name.map(str::trim).filter(|n| !n.is_empty()) {
            request.wallet_name = Some(name.to_string());
        }
        Ok(request)
    }
}

/// Result payload of a finished import. Never contains key material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Wallet label the tool was given
    pub wallet_name: String,
    /// Birthday height the scan started from
    pub birthday: BirthdayHeight,
    /// Slug naming the wallet directory
    pub slug: WalletSlug,
    /// File name of the report inside the exports directory
    pub file: String,
    /// Unparsed report text
    pub raw_text: String,
    /// Parsed transactions at or above the birthday
    pub transactions: Vec<Transaction>,
    /// Number of transactions dropped by the birthday filter
    pub dropped_below_birthday: usize,
}

/// One import job as held by the registry.
#[derive(Debug, Clone)]
pub struct Job {
    /// Job identifier
    pub id: JobId,
    /// Current state
    pub status: JobStatus,
    /// Estimated progress, 0-100
    pub progress: u8,
    /// Human-readable stage description
    pub message: String,
    /// When the job was created
    pub start_time: Timestamp,
    /// Set when status is done
    pub result: Option<ImportReport>,
    /// Set when status is failed
    pub error: Option<String>,
    /// Set when status is failed
    pub failure: Option<FailureKind>,
}

impl Job {
    /// A freshly queued job.
    #[must_use]
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0,
            message: "Queued…".to_string(),
            start_time: Timestamp::now(),
            result: None,
            error: None,
            failure: None,
        }
    }

    /// Raise progress to `value`; progress never moves backwards.
    pub fn raise_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
    }

    /// Copy out what a poller may see. A terminal job hands over its result.
    pub fn snapshot(&mut self, now: &Timestamp) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            elapsed: self.start_time.elapsed_secs(now),
            result: if self.status.is_terminal() {
                self.result.take()
            } else {
                None
            },
            error: self.error.clone(),
            failure: self.failure,
        }
    }
}

/// What `poll` returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job identifier
    pub id: JobId,
    /// Current state
    pub status: JobStatus,
    /// Estimated progress; approximate unless the job is done
    pub progress: u8,
    /// Human-readable stage description
    pub message: String,
    /// Whole seconds since the job was created
    pub elapsed: u64,
    /// Import result, present once when the job is done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ImportReport>,
    /// Error description, present when the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure category, present when the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

/// Job state shared by the registry, the worker and the progress estimator.
pub type SharedJob = Arc<Mutex<Job>>;

/// Lock a job cell.
///
/// A poisoned lock is recovered: a panicking worker must still be able to mark
/// its job failed.
pub fn lock_job(cell: &SharedJob) -> MutexGuard<'_, Job> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}
