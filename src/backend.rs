//! Backend client
//!
//! Everything this crate consumes from the capture process:
//! - `backend_trait`: the `Backend` interface and the `LiveFeed` stream.
//! - `http_backend`: its `reqwest` implementation.
//! - `sse`: incremental `text/event-stream` decoding.
//! - `types`: control actions, control options and the status report.

pub mod backend_trait;
pub mod http_backend;
pub mod sse;
pub mod types;

pub use backend_trait::{Backend, LiveFeed};
pub use http_backend::HttpBackend;
pub use types::{ControlAction, ControlOptions, StatusReport};
