//! Stream reconciliation
//!
//! Components:
//! - `stream_reconciler`: the task that merges history and live feed, and its handle.
//! - `session_state`: the state that task owns (store, filter, unread counter).
//! - `status_poller`: periodic status polling, separate from event data.
//! - `types`: phases, commands and internal messages.

pub mod session_state;
pub mod status_poller;
pub mod stream_reconciler;
pub mod types;


pub use session_state::SessionState;
pub use status_poller::{StatusHandle, StatusPoller, StatusView};
pub use stream_reconciler::{ReconcilerHandle, StreamReconciler};
pub use types::{ReconcilerPhase, ReconcilerSettings};
