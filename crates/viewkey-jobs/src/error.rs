use thiserror::Error;
use viewkey_core::{JobId, ViewKeyError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Invalid import request: {0}")]
    InvalidRequest(String),

    #[error("Job id {0} is already registered")]
    DuplicateId(JobId),

    #[error("Failed to run scanning tool: {0}")]
    Invoker(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] ViewKeyError),
}

pub type Result<T> = std::result::Result<T, JobError>;
