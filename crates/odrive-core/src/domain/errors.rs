//! Error taxonomy for the transfer engine
//!
//! Every operation in the SDK settles with either a result or exactly one of
//! these variants. Retryable classes (`Network`, `Timeout`, `Server`) are
//! absorbed by the upload session manager up to its retry bound; fatal
//! classes surface unchanged with the full server-provided context.

use thiserror::Error;

/// Errors produced by API calls and transfer operations
#[derive(Debug, Error)]
pub enum ApiError {
    /// A connection-level failure occurred (DNS, TLS, reset). Retryable.
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded its deadline. Retryable.
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The server reported a retryable HTTP condition: a 5xx error, or 429
    /// throttling once the retry bound is exhausted. Retryable with backoff.
    #[error("Server error {status}: {message}")]
    Server {
        /// HTTP status code (429 or 500-599)
        status: u16,
        /// Server-provided message, if any
        message: String,
    },

    /// The server rejected the request with a 4xx error. Fatal; carries the
    /// server-provided error code and message verbatim.
    #[error("Client error {status} ({code}): {message}")]
    Client {
        /// HTTP status code (400-499)
        status: u16,
        /// Machine-readable error code from the error envelope
        code: String,
        /// Human-readable message from the error envelope
        message: String,
    },

    /// The server response is inconsistent with the expected protocol state
    /// machine (e.g. a confirmed upload offset moving backwards, or an error
    /// body that is not the documented envelope). Fatal; indicates a bug or
    /// an incompatible API change, not a legitimate API failure.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// A local filesystem operation failed. Fatal.
    #[error("Local I/O error: {0}")]
    LocalIo(#[from] std::io::Error),

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration (e.g. a chunk size that is zero or not aligned).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Returns `true` for error classes that a retry may resolve.
    ///
    /// Fatal classes (`Client`, `Protocol`, `LocalIo`, `Cancelled`, `Config`)
    /// must never be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Network(_) | ApiError::Timeout(_) | ApiError::Server { .. }
        )
    }
}
