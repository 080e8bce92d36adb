//! Integration tests for the transfer engine
//!
//! Exercises upload, download, and item operations end to end against
//! wiremock-based mock servers.

mod common;
mod test_download;
