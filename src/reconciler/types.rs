use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::backend::types::{ControlAction, ControlOptions};
use crate::configuration::Config;
use crate::error_handling::types::{ConfigError, ControlError, TransportError};
use crate::event_store::KeyRetention;
use crate::view::types::ProtocolFilter;

/// Lifecycle of the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReconcilerPhase {
    Idle,
    LoadingSnapshot,
    /// `reconnecting` is set between a dropped connection and the next successful one.
    Subscribed { reconnecting: bool },
    Closed,
}

pub(crate) type Ack = oneshot::Sender<()>;

/// Requests sent by a `ReconcilerHandle`.
#[derive(Debug)]
pub(crate) enum UserCommand {
    Control {
        action: ControlAction,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
    Clear(Ack),
    SetFilter(ProtocolFilter, Ack),
    SetVisibility(bool, Ack),
    Shutdown,
}

/// Results of network round-trips run off the reconciler task.
#[derive(Debug)]
pub(crate) enum Completion {
    Snapshot {
        generation: u64,
        result: Result<Vec<Value>, TransportError>,
    },
    Control {
        action: ControlAction,
        result: Result<(), ControlError>,
        reply: oneshot::Sender<Result<(), ControlError>>,
    },
}

/// Traffic from the subscription task, tagged with the generation that opened it.
#[derive(Debug)]
pub(crate) enum LiveInput {
    Connected { generation: u64 },
    Message { generation: u64, data: String },
    Dropped { generation: u64 },
}

impl LiveInput {
    pub(crate) fn generation(&self) -> u64 {
        match self {
            LiveInput::Connected { generation }
            | LiveInput::Message { generation, .. }
            | LiveInput::Dropped { generation } => *generation,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub retention_cap: usize,
    pub key_retention: KeyRetention,
    pub reconnect_delay: Duration,
    pub title: String,
    pub payload_pattern: Regex,
    /// Body forwarded with start/restart.
    pub control_options: ControlOptions,
}

impl ReconcilerSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            retention_cap: config.stream.retention_cap,
            key_retention: config.stream.key_retention,
            reconnect_delay: config.reconnect_delay(),
            title: config.web_ui.title.clone(),
            payload_pattern: config.payload_pattern()?,
            control_options: config.backend.control.clone(),
        })
    }
}
