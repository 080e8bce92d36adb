//! SDK configuration
//!
//! Typed configuration for the transfer engine with defaults and validation.
//! The chunk-size constraint comes from the service contract: upload chunks
//! must be multiples of 320 KiB, except for the final chunk of a file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::ApiError;

/// Required alignment of upload chunk sizes: 320 KiB.
pub const CHUNK_ALIGNMENT: u64 = 320 * 1024;

/// Default chunk size: 10 MiB (32 × 320 KiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default bound on consecutive retryable failures per upload session.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Configuration for the transfer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Base URL of the API (override for tests against a mock server).
    pub base_url: String,
    /// Deadline applied to each individual request.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Upload chunk size in bytes; must be a positive multiple of
    /// [`CHUNK_ALIGNMENT`].
    pub chunk_size: u64,
    /// Consecutive retryable failures tolerated before an upload session
    /// transitions to its failed state.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    #[serde(with = "duration_secs")]
    pub retry_base_delay: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com/v1.0/me".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl TransferConfig {
    /// Validates the configuration, rejecting a chunk size of zero or one
    /// that is not a multiple of the required alignment.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.chunk_size == 0 {
            return Err(ApiError::Config("chunk size must not be zero".to_string()));
        }
        if self.chunk_size % CHUNK_ALIGNMENT != 0 {
            return Err(ApiError::Config(format!(
                "chunk size {} is not a multiple of {} bytes",
                self.chunk_size, CHUNK_ALIGNMENT
            )));
        }
        if self.max_retries == 0 {
            return Err(ApiError::Config(
                "max retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Rounds an arbitrary requested chunk size down to the nearest aligned
    /// size, keeping at least one alignment unit.
    pub fn aligned_chunk_size(requested: u64) -> u64 {
        let aligned = requested - (requested % CHUNK_ALIGNMENT);
        aligned.max(CHUNK_ALIGNMENT)
    }

    /// Backoff delay before the given retry attempt (0-based), doubling per
    /// attempt and capped at 60 seconds.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(6);
        (self.retry_base_delay * factor as u32).min(Duration::from_secs(60))
    }
}

mod duration_secs {
    //! Serialize `Duration` fields as whole seconds.

    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
