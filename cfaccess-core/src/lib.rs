//! Core types for cfaccess.
//!
//! Everything in this crate is free of I/O: the data model shared between the
//! CLI and the remote API client, the pure plan computation ([`diff`]), and the
//! event and error types the other crates report through.

pub mod diff;
pub mod error;
pub mod event;
pub mod model;
pub mod plan;

pub use error::Error;
