//! Snapflow server library
//!
//! The three-stage pipeline and its read-side API:
//!
//! - [`ingest`]: fetch each configured source, persist the raw capture,
//!   hand off a queue message
//! - [`transform`]: consume queue messages, map raw captures into curated
//!   records, write them idempotently
//! - [`api`]: list/lookup/analytics over the curated store
//! - [`stores`]: the raw store / queue / curated store capability traits
//!   and their backends
//! - [`orchestrator`]: the periodic pipeline driver

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod orchestrator;
pub mod stores;
pub mod transform;
