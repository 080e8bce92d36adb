//! Thin item operations
//!
//! Single-request convenience calls (copy, move, delete, create folder)
//! layered directly on [`ApiClient`] and pointer resolution. No retry or
//! coordination logic lives here; callers that need resilience await these
//! from their own policy layer.

use reqwest::Method;
use tracing::debug;

use odrive_core::{parse_metadata, ApiError, ItemMetadata, Operator, Pointer};

use crate::classify::{classify, retryable_to_error, Outcome};
use crate::client::{ApiClient, RawResponse};

/// Checks a response against the single status code an operation expects.
fn expect_status(raw: &RawResponse, expected: u16) -> Result<(), ApiError> {
    match classify(raw.status, &raw.body, raw.retry_after()) {
        Outcome::Success if raw.status == expected => Ok(()),
        Outcome::Success => Err(ApiError::Protocol(format!(
            "expected status {expected}, server answered {}",
            raw.status
        ))),
        Outcome::Retryable { reason, .. } => Err(retryable_to_error(raw.status, &reason)),
        Outcome::Fatal(err) => Err(err),
    }
}

/// Requests a server-side copy of `src` into `dest_parent`.
///
/// Copying is asynchronous on the server; the returned string is the URL
/// from the `Location` header that can be polled for completion status.
pub async fn copy_item(
    client: &ApiClient,
    src: &Pointer,
    dest_parent: &Pointer,
    new_name: Option<&str>,
) -> Result<String, ApiError> {
    let path = src.resolve_operator(Operator::ActionCopy)?;

    let mut body = serde_json::json!({ "parentReference": dest_parent.to_parent_reference() });
    if let Some(name) = new_name {
        body["name"] = serde_json::json!(name);
    }

    let raw = client
        .send_once(
            Method::POST,
            &path,
            &[("Content-Type", "application/json".to_string())],
            Some(body.to_string().into_bytes()),
        )
        .await?;

    // the copy request is acknowledged with 202 Accepted + monitor URL
    expect_status(&raw, 202)?;

    let monitor = raw.header("Location").ok_or_else(|| {
        ApiError::Protocol("copy accepted without a Location monitor URL".to_string())
    })?;
    debug!(%src, monitor, "copy accepted");
    Ok(monitor.to_string())
}

/// Moves `src` under `dest_parent` and returns the updated item.
pub async fn move_item(
    client: &ApiClient,
    src: &Pointer,
    dest_parent: &Pointer,
) -> Result<ItemMetadata, ApiError> {
    let body = serde_json::json!({ "parentReference": dest_parent.to_parent_reference() });

    let raw = client
        .send_once(
            Method::PATCH,
            &src.resolve(),
            &[("Content-Type", "application/json".to_string())],
            Some(body.to_string().into_bytes()),
        )
        .await?;

    expect_status(&raw, 200)?;
    parse_metadata(&raw.body)
}

/// Deletes the item referenced by `pointer`.
pub async fn delete_item(client: &ApiClient, pointer: &Pointer) -> Result<(), ApiError> {
    let raw = client
        .send_once(Method::DELETE, &pointer.resolve(), &[], None)
        .await?;

    expect_status(&raw, 204)
}

/// Creates a folder named `name` under `parent` and returns its metadata.
pub async fn create_folder(
    client: &ApiClient,
    parent: &Pointer,
    name: &str,
) -> Result<ItemMetadata, ApiError> {
    let path = parent.resolve_operator(Operator::Children)?;
    let body = serde_json::json!({ "name": name, "folder": {} });

    let raw = client
        .send_once(
            Method::POST,
            &path,
            &[("Content-Type", "application/json".to_string())],
            Some(body.to_string().into_bytes()),
        )
        .await?;

    expect_status(&raw, 201)?;
    parse_metadata(&raw.body)
}
