//! Integration tests for the download pipeline

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use odrive_client::{ApiClient, Downloader};
use odrive_core::{ApiError, Pointer};

use crate::common;

#[tokio::test]
async fn test_download_with_new_name_streams_to_disk() {
    let (server, client, _config) = common::setup().await;

    let content: Vec<u8> = (0..262_144).map(|i| (i % 255) as u8).collect();
    common::mount_content_download(&server, "file-001", &content).await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(client);
    let future = downloader.download(
        &Pointer::from_id("file-001"),
        dir.path(),
        Some("local-copy.bin"),
    );

    let dest = future.awaited().await.expect("download should succeed");
    assert_eq!(*dest, dir.path().join("local-copy.bin"));
    assert_eq!(std::fs::read(&*dest).unwrap(), content);
}

#[tokio::test]
async fn test_download_resolves_presigned_url_and_remote_name() {
    let (server, client, _config) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/items/file-002"))
        .and(query_param("select", "name,@content.downloadUrl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "report.pdf",
            "@content.downloadUrl": format!("{}/presigned/abc", server.uri())
        })))
        .mount(&server)
        .await;

    let content = b"pdf bytes";
    Mock::given(method("GET"))
        .and(path("/presigned/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(client);
    let future = downloader.download(&Pointer::from_id("file-002"), dir.path(), None);

    let dest = future.awaited().await.expect("download should succeed");
    assert_eq!(*dest, dir.path().join("report.pdf"));
    assert_eq!(std::fs::read(&*dest).unwrap(), content);
}

#[tokio::test]
async fn test_invalid_destination_fails_before_any_network_call() {
    let server = MockServer::start().await;
    let client = ApiClient::with_base_url(reqwest::Client::new(), "tok", server.uri());

    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("plain-file");
    std::fs::write(&not_a_dir, b"occupied").unwrap();

    let downloader = Downloader::new(client);
    let future = downloader.download(&Pointer::from_id("file-003"), &not_a_dir, Some("x.bin"));

    let err = future.awaited().await.expect_err("destination is invalid");
    assert!(matches!(&*err, ApiError::LocalIo(_)));

    // validation rejected the transfer without touching the network
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_download_non_2xx_is_fatal_with_server_detail() {
    let (server, client, _config) = common::setup().await;

    Mock::given(method("GET"))
        .and(path("/drive/items/missing/content"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": { "code": "itemNotFound", "message": "The resource could not be found" }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let downloader = Downloader::new(client);
    let future = downloader.download(&Pointer::from_id("missing"), dir.path(), Some("x.bin"));

    let err = future.awaited().await.expect_err("404 must fail the download");
    match &*err {
        ApiError::Client { status, code, .. } => {
            assert_eq!(*status, 404);
            assert_eq!(code, "itemNotFound");
        }
        other => panic!("expected client error, got {other:?}"),
    }

    // no partial file left for a rejected download
    assert!(!dir.path().join("x.bin").exists());
}

#[tokio::test]
async fn test_download_refuses_to_overwrite_existing_file() {
    let (server, client, _config) = common::setup().await;
    common::mount_content_download(&server, "file-004", b"new bytes").await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("keep.bin"), b"old bytes").unwrap();

    let downloader = Downloader::new(client);
    let future = downloader.download(&Pointer::from_id("file-004"), dir.path(), Some("keep.bin"));

    let err = future.awaited().await.expect_err("existing file must not be clobbered");
    assert!(matches!(&*err, ApiError::LocalIo(_)));
    assert_eq!(std::fs::read(dir.path().join("keep.bin")).unwrap(), b"old bytes");
}

#[tokio::test]
async fn test_download_creates_missing_destination_directory() {
    let (server, client, _config) = common::setup().await;
    common::mount_content_download(&server, "file-005", b"content").await;

    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");

    let downloader = Downloader::new(client);
    let future = downloader.download(&Pointer::from_id("file-005"), &nested, Some("f.bin"));

    let dest = future.awaited().await.expect("download should succeed");
    assert_eq!(std::fs::read(&*dest).unwrap(), b"content");
}
