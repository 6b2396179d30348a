//! Event store
//!
//! Bounded, deduplicated, arrival-ordered retention of accepted events.
//!
//! Components:
//! - `store`: the `EventStore` itself (snapshot replace, live append, eviction).
//! - `types`: retention policy and append outcome.

pub mod store;
pub mod types;

pub use store::EventStore;
pub use types::{AppendOutcome, KeyRetention, DEFAULT_RETENTION_CAP};
