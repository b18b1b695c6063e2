//! Shared types used across the viewkey crates.
//!
//! This module defines the newtypes that keep secret key material, wallet
//! slugs and job identifiers from being mixed up with arbitrary strings.

use crate::error::ViewKeyError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;
use zeroize::Zeroizing;

/// Block height before which a wallet is assumed to be inactive.
pub type BirthdayHeight = u64;

/// Secret viewing key material.
///
/// The inner buffer is wiped on drop and the `Debug` output is redacted, so a
/// key can travel through job state without ending up in logs.
#[derive(Clone)]
pub struct ViewingKey(Zeroizing<String>);

impl ViewingKey {
    /// Wrap key text, trimming surrounding whitespace.
    ///
    /// # Errors
    /// Returns error if the key is empty after trimming.
    pub fn new(key: impl AsRef<str>) -> Result<Self, ViewKeyError> {
        let trimmed = key.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ViewKeyError::Validation(
                "viewing key must not be empty".to_string(),
            ));
        }
        Ok(Self(Zeroizing::new(trimmed.to_string())))
    }

    /// Expose the key text. Callers must not log or persist it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length of the key in bytes, safe to log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: construction rejects empty keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ViewingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewingKey(<redacted, {} bytes>)", self.0.len())
    }
}

/// Stable, filesystem-safe identifier derived from a viewing key.
///
/// The slug names the external tool's wallet directory, so the same key always
/// reuses the same on-disk state and different keys never share it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletSlug(String);

impl WalletSlug {
    /// Prefix shared by every slug.
    pub const PREFIX: &'static str = "vk_";

    /// Number of digest hex characters kept after the prefix.
    pub const DIGEST_CHARS: usize = 16;

    /// Derive the slug for a viewing key: `vk_` + the first 16 hex characters
    /// of the SHA-256 digest of the key's UTF-8 bytes.
    #[must_use]
    pub fn derive(key: &ViewingKey) -> Self {
        let digest = hex::encode(Sha256::digest(key.expose().as_bytes()));
        let slug = Self(format!("{}{}", Self::PREFIX, &digest[..Self::DIGEST_CHARS]));
        tracing::debug!("Derived wallet slug {} for viewing key (len={})", slug, key.len());
        slug
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short token identifying one import job.
///
/// Job IDs are 12 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Length of a job id in characters.
    pub const LEN: usize = 12;

    /// Create a `JobId` from a string, e.g. one taken from a request path.
    ///
    /// # Errors
    /// Returns error if the ID is not 12 lowercase hex characters.
    pub fn new(id: impl Into<String>) -> Result<Self, ViewKeyError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Condense arbitrary seed bytes into a job id.
    #[must_use]
    pub fn derive(seed: &[u8]) -> Self {
        let digest = hex::encode(Sha256::digest(seed));
        Self(digest[..Self::LEN].to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), ViewKeyError> {
        static JOB_ID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex =
            JOB_ID_REGEX.get_or_init(|| Regex::new(r"^[0-9a-f]{12}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(ViewKeyError::Validation(format!(
                "invalid job ID: must be {} lowercase hex characters, got '{id}'",
                Self::LEN
            )))
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Nanoseconds since Unix epoch, saturating when out of range.
    #[must_use]
    pub fn timestamp_nanos(&self) -> i64 {
        self.0.timestamp_nanos_opt().unwrap_or(i64::MAX)
    }

    /// Whole seconds elapsed between this timestamp and `now`, never negative.
    #[must_use]
    pub fn elapsed_secs(&self, now: &Timestamp) -> u64 {
        u64::try_from((now.0 - self.0).num_seconds()).unwrap_or(0)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
