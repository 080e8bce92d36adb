//! odrive client - async request client and resumable transfer engine
//!
//! Protocol layer of the odrive SDK:
//! - [`client`] - single-request HTTP client with per-request deadlines
//! - [`classify`] - typed classification of responses into success /
//!   retryable / fatal outcomes
//! - [`upload`] - resumable chunked upload session manager
//! - [`download`] - streaming download pipeline
//! - [`ops`] - thin single-request item operations (copy, move, delete,
//!   create folder)
//!
//! All operations complete through [`odrive_core::TransferFuture`] handles;
//! the connection pool (`reqwest::Client`) is constructed by the embedding
//! application and shared across transfers.

pub mod classify;
pub mod client;
pub mod download;
pub mod ops;
pub mod upload;

pub use classify::Outcome;
pub use client::{ApiClient, RawResponse};
pub use download::Downloader;
pub use upload::{UploadSession, UploadSessionManager};
