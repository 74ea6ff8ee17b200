//! opuskit Common Library
//!
//! Shared utilities and error handling for the opuskit workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the [`Result`] alias
//! - **Checksums**: SHA-256 file digests for integrity verification
//! - **Filesystem**: staged writes that never expose a partial file under its final name
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use opuskit_common::checksum::verify_sha256;
//! use opuskit_common::CommonError;
//!
//! match verify_sha256("mp3/07/1234.mp3", "916f0027a575074c...") {
//!     Ok(()) => {}
//!     Err(CommonError::ChecksumMismatch { actual, .. }) => eprintln!("corrupt: {actual}"),
//!     Err(e) => eprintln!("unreadable: {e}"),
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod fs;
pub mod logging;

pub use error::{CommonError, Result};
