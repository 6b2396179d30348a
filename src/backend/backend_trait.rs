//! Backend Trait
//!
//! This module defines the `Backend` trait, the interface of the capture process this
//! dashboard consumes.
//!
//! Implementors of this trait are responsible for:
//! - Fetching the historical snapshot of captured events
//! - Fetching the process status
//! - Forwarding process-control actions
//! - Opening the live event feed
//!
//! All methods return a `Result` so that transport failures stay local to the caller.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error_handling::types::{ControlError, TransportError};

use super::types::{ControlAction, ControlOptions, StatusReport};

/// The `Backend` trait defines the interface of the capture backend.
///
/// Futures are `Send` so that the reconciler can drive them on spawned tasks.
pub trait Backend: Send + Sync + 'static {
    /// Returns the historical events, oldest first, as raw JSON records.
    fn fetch_history(&self) -> impl Future<Output = Result<Vec<Value>, TransportError>> + Send;

    /// Returns the current process status.
    fn fetch_status(&self) -> impl Future<Output = Result<StatusReport, TransportError>> + Send;

    /// Performs a process-control action.
    fn control(
        &self,
        action: ControlAction,
        options: &ControlOptions,
    ) -> impl Future<Output = Result<(), ControlError>> + Send;

    /// Opens one live subscription. The feed ends when the underlying connection drops.
    fn subscribe(&self) -> impl Future<Output = Result<LiveFeed, TransportError>> + Send;
}

/// Stream of raw JSON messages from one live subscription.
pub struct LiveFeed {
    rx: mpsc::Receiver<Result<String, TransportError>>,
}

impl LiveFeed {
    /// Wraps a channel; the feed ends once every sender is dropped.
    pub fn from_channel(rx: mpsc::Receiver<Result<String, TransportError>>) -> Self {
        Self { rx }
    }
}

impl Stream for LiveFeed {
    type Item = Result<String, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
