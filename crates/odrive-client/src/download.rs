//! Async download pipeline
//!
//! Resolves an item's content URL, streams the response body straight to a
//! freshly-created local file, and settles a [`TransferFuture`] with the
//! final path. Bytes never accumulate in memory beyond one stream chunk.
//!
//! Delivery is at-most-once without rollback: an I/O failure mid-stream
//! leaves the partially-written file in place for the caller to clean up.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Method;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use odrive_core::{ApiError, Operator, Pointer, TransferFuture, TransferPromise};

use crate::classify::{classify, retryable_to_error, Outcome};
use crate::client::ApiClient;

/// Item fields requested when the caller keeps the remote name.
///
/// The service answers with the item name and a short-lived pre-signed URL
/// distinct from the metadata endpoint.
#[derive(Debug, Deserialize)]
struct DownloadInfo {
    name: String,
    #[serde(rename = "@content.downloadUrl", alias = "@microsoft.graph.downloadUrl")]
    download_url: String,
}

/// Streams remote file content to local storage.
pub struct Downloader {
    client: ApiClient,
}

impl Downloader {
    /// Creates a downloader sharing the given client's connection pool.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Downloads the file referenced by `pointer` into `dest_dir`.
    ///
    /// With `new_name` the content endpoint is fetched directly and the
    /// local file takes that name; without it, the item's remote name and
    /// pre-signed download URL are resolved first.
    ///
    /// An invalid destination (exists and is not a directory) fails the
    /// transfer before any network request is issued.
    pub fn download(
        &self,
        pointer: &Pointer,
        dest_dir: &Path,
        new_name: Option<&str>,
    ) -> TransferFuture<PathBuf> {
        let request = match new_name {
            Some(name) => match pointer.resolve_operator(Operator::Content) {
                Ok(path) => Request::Content {
                    path,
                    file_name: name.to_string(),
                },
                Err(err) => return TransferFuture::settled(Err(err)),
            },
            None => Request::Resolve {
                path: format!("{}?select=name,@content.downloadUrl", pointer.resolve()),
            },
        };

        let (promise, future) = TransferFuture::pending();
        let client = self.client.clone();
        let dest_dir = dest_dir.to_path_buf();

        tokio::spawn(async move {
            if let Some(result) = run_download(&client, request, &dest_dir, &promise).await {
                promise.settle(result);
            }
        });

        future
    }
}

/// How the content bytes are located.
enum Request {
    /// GET the content operator endpoint directly (service redirects to the
    /// pre-signed URL; reqwest follows it).
    Content { path: String, file_name: String },
    /// Resolve name + pre-signed URL from item metadata first.
    Resolve { path: String },
}

/// Validates the destination directory, creating it if missing.
///
/// Runs inside the download task so the filesystem checks stay off the
/// caller's thread, but always before any network request.
async fn prepare_dest_dir(dest_dir: &Path) -> Result<(), ApiError> {
    match tokio::fs::metadata(dest_dir).await {
        Ok(meta) if !meta.is_dir() => Err(ApiError::LocalIo(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} exists and is not a directory", dest_dir.display()),
        ))),
        Ok(_) => Ok(()),
        Err(_) => tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(ApiError::LocalIo),
    }
}

/// Drives one download. Returns `None` if the future was settled externally
/// (cancellation) while streaming.
async fn run_download(
    client: &ApiClient,
    request: Request,
    dest_dir: &Path,
    promise: &TransferPromise<PathBuf>,
) -> Option<Result<PathBuf, ApiError>> {
    if let Err(err) = prepare_dest_dir(dest_dir).await {
        return Some(Err(err));
    }

    let (url, file_name, with_auth) = match request {
        Request::Content { path, file_name } => (client.url_for(&path), file_name, true),
        Request::Resolve { path } => {
            let raw = match client.send_once(Method::GET, &path, &[], None).await {
                Ok(raw) => raw,
                Err(err) => return Some(Err(err)),
            };
            match classify(raw.status, &raw.body, raw.retry_after()) {
                Outcome::Success => {}
                Outcome::Fatal(err) => return Some(Err(err)),
                Outcome::Retryable { reason, .. } => {
                    return Some(Err(retryable_to_error(raw.status, &reason)))
                }
            }
            let info: DownloadInfo = match serde_json::from_slice(&raw.body) {
                Ok(info) => info,
                Err(e) => {
                    return Some(Err(ApiError::Protocol(format!(
                        "item response lacks name/downloadUrl: {e}"
                    ))))
                }
            };
            // Pre-signed URLs embed their own authorization.
            (info.download_url, info.name, false)
        }
    };

    let dest_path = dest_dir.join(&file_name);
    debug!(url, dest = %dest_path.display(), "starting download");

    let mut builder = client.http().get(&url);
    if with_auth {
        builder = builder.bearer_auth(client.access_token());
    }
    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => return Some(Err(ApiError::Network(e.to_string()))),
    };

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        // Any non-2xx download response is fatal.
        let body = response.bytes().await.unwrap_or_default();
        let err = match classify(status, &body, None) {
            Outcome::Fatal(err) => err,
            Outcome::Retryable { reason, .. } => retryable_to_error(status, &reason),
            Outcome::Success => ApiError::Protocol(format!("inconsistent status {status}")),
        };
        warn!(status, dest = %dest_path.display(), "download rejected");
        return Some(Err(err));
    }

    // Exclusive create: an existing file at the destination is an error,
    // never silently overwritten.
    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&dest_path)
        .await
    {
        Ok(file) => file,
        Err(e) => return Some(Err(ApiError::LocalIo(e))),
    };

    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        if promise.is_settled() {
            debug!(dest = %dest_path.display(), written, "download cancelled; partial file left in place");
            return None;
        }
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Some(Err(ApiError::Network(e.to_string()))),
        };
        if let Err(e) = file.write_all(&chunk).await {
            // partial file intentionally left behind
            return Some(Err(ApiError::LocalIo(e)));
        }
        written += chunk.len() as u64;
    }

    if let Err(e) = file.flush().await {
        return Some(Err(ApiError::LocalIo(e)));
    }

    info!(dest = %dest_path.display(), written, "download completed");
    Some(Ok(dest_path))
}
