//! Viewkey Jobs - asynchronous viewing-key import jobs.
//!
//! An import scans the chain with an external tool, which takes minutes. The
//! [`JobManager`] therefore registers a job, runs the tool in a background
//! task, and lets callers poll for progress and the final [`ImportReport`].
//!
//! # Example
//!
//! ```rust,no_run
//! use viewkey_core::{AppConfig, ViewingKey};
//! use viewkey_jobs::{ImportRequest, JobManager, JobStatus};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load_with_env()?;
//! let manager = JobManager::from_config(&config);
//!
//! let key = ViewingKey::new("uview1...")?;
//! let id = manager.create(ImportRequest::new(key, 2_600_000))?;
//!
//! loop {
//!     let snapshot = manager.poll(&id)?;
//!     if snapshot.status.is_terminal() {
//!         println!("{}: {:?}", snapshot.message, snapshot.error);
//!         break;
//!     }
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod classify;
#[allow(missing_docs)]
pub mod error;
pub mod invoker;
pub mod job;
pub mod manager;
pub mod progress;
pub mod registry;

// Re-export commonly used types
pub use classify::{
    ClassifyContext, FailureCategory, FailureClassifier, SubstringClassifier, ToolFailure,
};
pub use error::{JobError, Result};
pub use invoker::{DevtoolInvoker, ScriptInvoker, SyncInvoker, SyncRequest, ToolOutput};
pub use job::{FailureKind, ImportReport, ImportRequest, Job, JobSnapshot, JobStatus};
pub use manager::JobManager;
pub use progress::ProgressSettings;
pub use registry::JobRegistry;
