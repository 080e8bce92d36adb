//! odrive core - domain types and the transfer-future abstraction
//!
//! This crate contains everything the protocol layer builds on:
//! - **Pointers** - logical item references (by id or by path) and their
//!   resolution into canonical API paths, including operator suffixes
//! - **Errors** - the typed error taxonomy shared by every operation
//! - **Futures** - the explicit state + listener completion handle used to
//!   drive all asynchronous calls
//! - **Config** - transfer-engine settings with validation
//!
//! The crate is deliberately free of any HTTP client dependency; adapters
//! live in `odrive-client`.

pub mod config;
pub mod domain;
pub mod future;

pub use config::TransferConfig;
pub use domain::errors::ApiError;
pub use domain::item::{parse_metadata, ItemMetadata};
pub use domain::pointer::{Operator, Pointer};
pub use future::{TransferFuture, TransferPromise, TransferResult};
