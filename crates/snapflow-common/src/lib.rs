//! Snapflow Common Library
//!
//! Shared types, utilities, and error handling for the snapflow workspace.
//!
//! # Overview
//!
//! This crate provides functionality used across all snapflow workspace
//! members:
//!
//! - **Error Handling**: the `SnapflowError` enum and `Result` alias
//! - **Digests**: content hashing for captures and per-item fingerprints
//! - **Cursors**: opaque, reversible pagination cursors
//! - **Types**: the pipeline data model (sources, captures, queue messages,
//!   curated records)
//! - **Logging**: tracing subscriber initialization

pub mod cursor;
pub mod digest;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SnapflowError};
