//! Shared primitives for the scopeloom workspace.
//!
//! `scopeloom-core` provides the pieces the builder crate leans on:
//!
//! - **Error types**: [`LoomError`] and [`Result`] for structured error handling
//! - **Traits**: [`Summarizable`] for one-line descriptions of containers
//! - **Compression**: zlib deflate/inflate for attribute payloads (std feature only)

pub mod error;
pub mod traits;

#[cfg(feature = "std")]
pub mod compress;

pub use error::{LoomError, Result};
pub use traits::*;
