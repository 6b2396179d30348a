//! Event model
//!
//! Ingestion-side types and the two pure functions everything downstream relies on:
//! - `types`: lenient wire shapes and the normalized `EventRecord`.
//! - `timestamp`: coercion of any timestamp representation to epoch seconds.
//! - `identity`: the deduplication key of a record.

pub mod identity;
pub mod timestamp;
pub mod types;

pub use identity::{identity_key, IdentityKey};
pub use types::{DnsRecord, EventRecord, HttpRecord, Protocol};
