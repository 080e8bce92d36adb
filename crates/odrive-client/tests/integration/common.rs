//! Shared helpers for transfer-engine integration tests
//!
//! Provides wiremock-based mock endpoints for the drive API: upload session
//! creation, a stateless chunk acknowledger that answers per the protocol
//! (202 + nextExpectedRanges for intermediate chunks, 201 + item metadata
//! for the final one), and content downloads.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use odrive_client::ApiClient;
use odrive_core::TransferConfig;

/// Chunk size used by most tests: the service's minimum alignment.
pub const TEST_CHUNK: u64 = 320 * 1024;

/// Starts a mock server and returns it with a client and a test-friendly
/// transfer config (small chunks, fast backoff).
pub async fn setup() -> (MockServer, ApiClient, TransferConfig) {
    let server = MockServer::start().await;
    let config = TransferConfig {
        base_url: server.uri(),
        request_timeout: Duration::from_secs(5),
        chunk_size: TEST_CHUNK,
        max_retries: 3,
        retry_base_delay: Duration::from_millis(10),
    };
    let client = ApiClient::new(reqwest::Client::new(), "test-access-token", &config);
    (server, client, config)
}

/// Parses a `Content-Range: bytes {start}-{end}/{total}` header value.
pub fn parse_content_range(value: &str) -> Option<(u64, u64, u64)> {
    let rest = value.strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;
    let (start, end) = range.split_once('-')?;
    Some((start.parse().ok()?, end.parse().ok()?, total.parse().ok()?))
}

/// Responds to chunk PUTs according to the resumable-upload protocol.
///
/// Intermediate chunks get `202 {"nextExpectedRanges": ["{end+1}-"]}`; the
/// chunk whose range touches the end of the file gets `201` with the given
/// item id and name.
pub struct ChunkAcknowledger {
    pub item_id: String,
    pub item_name: String,
}

impl Respond for ChunkAcknowledger {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);

        match range {
            Some((_start, end, total)) if end + 1 == total => ResponseTemplate::new(201)
                .set_body_json(serde_json::json!({
                    "id": self.item_id,
                    "name": self.item_name,
                    "size": total,
                    "lastModifiedDateTime": "2026-08-27T10:00:00Z",
                    "file": {}
                })),
            Some((_start, end, _total)) => ResponseTemplate::new(202).set_body_json(
                serde_json::json!({ "nextExpectedRanges": [format!("{}-", end + 1)] }),
            ),
            None => ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": { "code": "invalidRange", "message": "missing Content-Range" }
            })),
        }
    }
}

/// Mounts the create-session endpoint for `{parent}/{file}` and the chunk
/// acknowledger on `/upload-session/{session_id}`. Returns the upload URL.
pub async fn mount_upload_session(
    server: &MockServer,
    session_path: &str,
    session_id: &str,
    item_id: &str,
    item_name: &str,
) -> String {
    let upload_url = format!("{}/upload-session/{}", server.uri(), session_id);

    Mock::given(method("POST"))
        .and(path(session_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "uploadUrl": upload_url,
            "expirationDateTime": "2026-08-28T00:00:00Z"
        })))
        .mount(server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/upload-session/{session_id}")))
        .respond_with(ChunkAcknowledger {
            item_id: item_id.to_string(),
            item_name: item_name.to_string(),
        })
        .mount(server)
        .await;

    upload_url
}

/// Mounts a content download endpoint for an id-addressed item.
pub async fn mount_content_download(server: &MockServer, item_id: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/drive/items/{item_id}/content")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.to_vec())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(server)
        .await;
}

/// Reassembles the uploaded bytes from the PUT requests the server saw.
///
/// Later writes to the same offset win, mirroring how the service applies
/// re-sent ranges after a resume.
pub async fn reassemble_uploaded(server: &MockServer, total: usize) -> Vec<u8> {
    let mut content = vec![0u8; total];
    let requests = server
        .received_requests()
        .await
        .expect("request recording enabled");

    for request in requests {
        if request.method.as_str() != "PUT" {
            continue;
        }
        let Some((start, end, _)) = request
            .headers
            .get("Content-Range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
        else {
            continue;
        };
        let (start, end) = (start as usize, end as usize);
        content[start..=end].copy_from_slice(&request.body);
    }
    content
}
