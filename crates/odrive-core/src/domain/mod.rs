//! Domain types for the odrive SDK
//!
//! Pure types with no HTTP dependency: item pointers and their resolution
//! rules, the error taxonomy, and the minimal item-metadata mapping used at
//! transfer completion.

pub mod errors;
pub mod item;
pub mod pointer;
