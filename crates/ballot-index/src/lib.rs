//! Snapshot hub client for the ballot pipeline.
//!
//! Implements [`ballot_core::RemoteIndex`] over the hub's GraphQL endpoint
//! using blocking `reqwest` with a fixed-backoff retry loop.

mod client;
pub mod queries;

pub use client::{decode_envelope, RetryPolicy, SnapshotClient};
