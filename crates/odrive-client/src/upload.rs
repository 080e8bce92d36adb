//! Resumable upload session manager
//!
//! Uploads a local file of arbitrary size as a sequence of byte-range chunks
//! against a server-issued upload session, surviving transient failures by
//! re-querying the authoritative offset and resuming, with peak memory
//! bounded to a single chunk buffer.
//!
//! State machine:
//!
//! ```text
//! Uninitialized --createSession--> Active --final chunk--> Completed
//!        |                          |  ^
//!        |                          |  | status probe + retry
//!        |                          v  |
//!        +--fatal--> Failed <--fatal/bound exhausted
//! ```
//!
//! Within one session chunks are sent strictly in increasing offset order;
//! chunk N+1 is never issued before chunk N's outcome is classified, because
//! offset advancement depends on the server-confirmed result.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, info, warn};

use odrive_core::{
    parse_metadata, ApiError, ItemMetadata, Operator, Pointer, TransferConfig, TransferFuture,
    TransferPromise,
};

use crate::classify::{classify, retryable_to_error, Outcome};
use crate::client::{ApiClient, RawResponse};

// ============================================================================
// Wire types
// ============================================================================

/// Response from `POST {path}:/upload.createSession`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    /// Short-lived URL all chunk requests go to
    upload_url: String,
    /// When the session expires
    expiration_date_time: Option<DateTime<Utc>>,
}

/// Intermediate chunk response / status probe response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionStatusResponse {
    /// Byte ranges the server still expects, e.g. `["327680-"]`
    next_expected_ranges: Option<Vec<String>>,
}

/// Start offset of the first range the server still expects.
fn first_expected_offset(ranges: &[String]) -> Option<u64> {
    let first = ranges.first()?;
    let start = first.split('-').next()?;
    start.trim().parse().ok()
}

// ============================================================================
// UploadSession
// ============================================================================

/// Server-issued resumable upload session state.
///
/// Invariant: `0 <= next_offset <= total_size`. The session is exhausted
/// exactly when `next_offset == total_size` and the final chunk response
/// carried the finished item metadata.
#[derive(Debug)]
pub struct UploadSession {
    /// Short-lived upload URL issued by the server
    pub upload_url: String,
    /// Total file size in bytes
    pub total_size: u64,
    /// Configured (validated) chunk size in bytes
    pub chunk_size: u64,
    /// Offset of the next byte to send
    pub next_offset: u64,
    /// Session expiration, if reported
    pub expiration: Option<DateTime<Utc>>,
}

impl UploadSession {
    /// Byte range of the next chunk as `(start, end_inclusive, len)`.
    pub fn next_chunk_span(&self) -> (u64, u64, u64) {
        let len = self.chunk_size.min(self.total_size - self.next_offset);
        (self.next_offset, self.next_offset + len - 1, len)
    }

    /// Whether every byte has been confirmed by the server.
    pub fn is_exhausted(&self) -> bool {
        self.next_offset == self.total_size
    }

    /// Advances to a server-confirmed offset.
    ///
    /// A confirmed offset smaller than the locally tracked one means the
    /// server rewound state we already had acknowledged; that is a protocol
    /// violation, not a resumable condition.
    fn advance_to(&mut self, confirmed: u64) -> Result<(), ApiError> {
        if confirmed < self.next_offset {
            return Err(ApiError::Protocol(format!(
                "server confirmed offset {} behind local offset {}",
                confirmed, self.next_offset
            )));
        }
        if confirmed > self.total_size {
            return Err(ApiError::Protocol(format!(
                "server confirmed offset {} beyond total size {}",
                confirmed, self.total_size
            )));
        }
        self.next_offset = confirmed;
        Ok(())
    }
}

// ============================================================================
// UploadSessionManager
// ============================================================================

/// Orchestrates resumable chunked uploads on top of [`ApiClient`].
pub struct UploadSessionManager {
    client: ApiClient,
    config: TransferConfig,
}

impl UploadSessionManager {
    /// Creates a manager sharing the given client's connection pool.
    pub fn new(client: ApiClient, config: TransferConfig) -> Self {
        Self { client, config }
    }

    /// Uploads `file_path` into the folder referenced by `parent`, naming
    /// the remote item after the local file name.
    ///
    /// Configuration and addressing errors settle the returned future before
    /// any network request is issued. Cancelling the future stops further
    /// chunks from being scheduled; an in-flight request is not aborted.
    pub fn upload(&self, parent: &Pointer, file_path: &Path) -> TransferFuture<ItemMetadata> {
        if let Err(err) = self.config.validate() {
            return TransferFuture::settled(Err(err));
        }

        let file_name = match file_path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                return TransferFuture::settled(Err(ApiError::Config(format!(
                    "cannot derive a file name from {}",
                    file_path.display()
                ))))
            }
        };

        let session_path = match parent
            .resolve_child(&file_name)
            .and_then(|p| p.resolve_operator(Operator::UploadCreateSession))
        {
            Ok(path) => path,
            Err(err) => return TransferFuture::settled(Err(err)),
        };

        let (promise, future) = TransferFuture::pending();
        let driver = Driver {
            client: self.client.clone(),
            config: self.config.clone(),
            session_path,
            file_path: file_path.to_path_buf(),
            file_name,
        };

        tokio::spawn(async move {
            let result = driver.run(&promise).await;
            // `run` returns None when the future was settled externally
            // (cancellation); the promise must not be settled again.
            if let Some(result) = result {
                promise.settle(result);
            }
        });

        future
    }
}

/// Per-upload state owned exclusively by the driving task.
struct Driver {
    client: ApiClient,
    config: TransferConfig,
    session_path: String,
    file_path: PathBuf,
    file_name: String,
}

impl Driver {
    /// Runs the full state machine. Returns `None` if the paired future was
    /// settled externally (cooperative cancellation).
    async fn run(&self, promise: &TransferPromise<ItemMetadata>) -> Option<Result<ItemMetadata, ApiError>> {
        let mut file = match File::open(&self.file_path).await {
            Ok(file) => file,
            Err(e) => return Some(Err(ApiError::LocalIo(e))),
        };
        let total_size = match file.metadata().await {
            Ok(meta) => meta.len(),
            Err(e) => return Some(Err(ApiError::LocalIo(e))),
        };
        if total_size == 0 {
            // The session protocol cannot express an empty Content-Range.
            return Some(Err(ApiError::Config(format!(
                "{} is empty; zero-length files cannot use a resumable session",
                self.file_path.display()
            ))));
        }

        let mut session = match self.create_session(total_size).await {
            Ok(session) => session,
            Err(e) => return Some(Err(e)),
        };

        info!(
            name = %self.file_name,
            total_size,
            chunks = total_size.div_ceil(session.chunk_size),
            "upload session created"
        );

        // One chunk buffer for the whole upload, regardless of file size.
        let mut buffer = vec![0u8; session.chunk_size as usize];
        let mut consecutive_failures: u32 = 0;

        while !session.is_exhausted() {
            if promise.is_settled() {
                debug!(name = %self.file_name, "upload cancelled; stopping chunk scheduling");
                return None;
            }

            let (start, end, len) = session.next_chunk_span();
            let chunk = &mut buffer[..len as usize];
            if let Err(e) = read_chunk_at(&mut file, start, chunk).await {
                return Some(Err(ApiError::LocalIo(e)));
            }

            let response = self
                .client
                .execute(
                    Method::PUT,
                    &session.upload_url,
                    &[
                        (
                            "Content-Range",
                            format!("bytes {}-{}/{}", start, end, session.total_size),
                        ),
                        ("Content-Length", len.to_string()),
                    ],
                    Some(chunk.to_vec()),
                )
                .await;

            let (raw, outcome) = match response {
                Ok(raw) => {
                    let outcome = classify(raw.status, &raw.body, raw.retry_after());
                    (Some(raw), outcome)
                }
                Err(err) if err.is_retryable() => (
                    None,
                    Outcome::Retryable {
                        reason: err.to_string(),
                        suggested_delay: None,
                    },
                ),
                // fatal transport-level condition; surface as-is
                Err(err) => return Some(Err(err)),
            };

            match outcome {
                Outcome::Success => {
                    consecutive_failures = 0;
                    let raw = match raw {
                        Some(raw) => raw,
                        None => {
                            return Some(Err(ApiError::Protocol(
                                "success outcome without a response".to_string(),
                            )))
                        }
                    };
                    match self.handle_chunk_success(&mut session, raw, start, len) {
                        ChunkProgress::Done(item) => return Some(Ok(item)),
                        ChunkProgress::Continue => {}
                        ChunkProgress::Abort(err) => return Some(Err(err)),
                    }
                }
                Outcome::Retryable {
                    reason,
                    suggested_delay,
                } => {
                    consecutive_failures += 1;
                    let status = raw.as_ref().map(|r| r.status).unwrap_or(0);
                    if consecutive_failures > self.config.max_retries {
                        warn!(
                            name = %self.file_name,
                            failures = consecutive_failures,
                            "retry bound exhausted"
                        );
                        return Some(Err(retryable_to_error(status, &reason)));
                    }

                    let delay = suggested_delay
                        .unwrap_or_else(|| self.config.backoff_delay(consecutive_failures - 1));
                    info!(
                        name = %self.file_name,
                        offset = start,
                        attempt = consecutive_failures,
                        delay_ms = delay.as_millis() as u64,
                        reason,
                        "retryable chunk failure; probing session status"
                    );
                    tokio::time::sleep(delay).await;

                    // Re-learn the authoritative offset; a failed probe
                    // counts against the same bound.
                    match self.probe_status(&session).await {
                        Ok(Some(confirmed)) => {
                            // The probe is authoritative: the server may
                            // legitimately report less than what we sent in
                            // the failed chunk, but never more than total.
                            if confirmed > session.total_size {
                                return Some(Err(ApiError::Protocol(format!(
                                    "status probe reported offset {} beyond total size {}",
                                    confirmed, session.total_size
                                ))));
                            }
                            session.next_offset = confirmed;
                        }
                        Ok(None) => {}
                        Err(err) if err.is_retryable() => {
                            debug!(name = %self.file_name, %err, "status probe failed; will retry");
                        }
                        Err(err) => return Some(Err(err)),
                    }
                }
                Outcome::Fatal(err) => {
                    warn!(name = %self.file_name, %err, "fatal chunk failure");
                    return Some(Err(err));
                }
            }
        }

        // All bytes confirmed but the server never returned item metadata.
        Some(Err(ApiError::Protocol(
            "session exhausted without final item metadata".to_string(),
        )))
    }

    /// Issues the create-session request, retrying transient failures up to
    /// the configured bound.
    async fn create_session(&self, total_size: u64) -> Result<UploadSession, ApiError> {
        let mut attempt: u32 = 0;
        loop {
            let response = self
                .client
                .send_once(
                    Method::POST,
                    &self.session_path,
                    &[("Content-Type", "application/json".to_string())],
                    Some(b"{}".to_vec()),
                )
                .await;

            let (status, retry_reason) = match response {
                Ok(raw) => match classify(raw.status, &raw.body, raw.retry_after()) {
                    Outcome::Success => {
                        let parsed: CreateSessionResponse = serde_json::from_slice(&raw.body)
                            .map_err(|e| {
                                ApiError::Protocol(format!(
                                    "malformed create-session response: {e}"
                                ))
                            })?;
                        return Ok(UploadSession {
                            upload_url: parsed.upload_url,
                            total_size,
                            chunk_size: self.config.chunk_size,
                            next_offset: 0,
                            expiration: parsed.expiration_date_time,
                        });
                    }
                    Outcome::Retryable { reason, .. } => (raw.status, reason),
                    Outcome::Fatal(err) => return Err(err),
                },
                Err(err) if err.is_retryable() => (0, err.to_string()),
                Err(err) => return Err(err),
            };

            attempt += 1;
            if attempt > self.config.max_retries {
                return Err(retryable_to_error(status, &retry_reason));
            }
            tokio::time::sleep(self.config.backoff_delay(attempt - 1)).await;
        }
    }

    /// Interprets a successful chunk response.
    fn handle_chunk_success(
        &self,
        session: &mut UploadSession,
        raw: RawResponse,
        start: u64,
        len: u64,
    ) -> ChunkProgress {
        match raw.status {
            // Final response: completed item metadata.
            200 | 201 => match parse_metadata(&raw.body) {
                Ok(item) => {
                    if let Err(err) = session.advance_to(session.total_size) {
                        return ChunkProgress::Abort(err);
                    }
                    info!(name = %self.file_name, id = %item.id, "upload completed");
                    ChunkProgress::Done(item)
                }
                Err(err) => ChunkProgress::Abort(err),
            },
            // Intermediate acknowledgement with the next expected ranges.
            _ => {
                let confirmed = serde_json::from_slice::<SessionStatusResponse>(&raw.body)
                    .ok()
                    .and_then(|s| s.next_expected_ranges.as_deref().and_then(first_expected_offset))
                    .unwrap_or(start + len);

                match session.advance_to(confirmed) {
                    Ok(()) => {
                        debug!(
                            name = %self.file_name,
                            confirmed,
                            total = session.total_size,
                            "chunk acknowledged"
                        );
                        ChunkProgress::Continue
                    }
                    Err(err) => ChunkProgress::Abort(err),
                }
            }
        }
    }

    /// Queries the session for the authoritative next offset.
    ///
    /// Returns `Ok(None)` when the server acknowledged the probe but did not
    /// report any expected range (complete or indeterminate).
    async fn probe_status(&self, session: &UploadSession) -> Result<Option<u64>, ApiError> {
        let raw = self
            .client
            .execute(Method::GET, &session.upload_url, &[], None)
            .await?;

        match classify(raw.status, &raw.body, raw.retry_after()) {
            Outcome::Success => {
                let status: SessionStatusResponse = serde_json::from_slice(&raw.body)
                    .map_err(|e| {
                        ApiError::Protocol(format!("malformed session status response: {e}"))
                    })?;
                Ok(status
                    .next_expected_ranges
                    .as_deref()
                    .and_then(first_expected_offset))
            }
            Outcome::Retryable { reason, .. } => Err(ApiError::Server {
                status: raw.status,
                message: reason,
            }),
            Outcome::Fatal(err) => Err(err),
        }
    }
}

/// Progress decision after a successful chunk response.
enum ChunkProgress {
    Continue,
    Done(ItemMetadata),
    Abort(ApiError),
}

/// Reads exactly `buf.len()` bytes at `offset`.
async fn read_chunk_at(file: &mut File, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset)).await?;
    file.read_exact(buf).await?;
    Ok(())
}
