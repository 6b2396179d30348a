use std::fmt;

use serde::{Deserialize, Serialize};

/// Process-control actions exposed by the capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
}

impl ControlAction {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(ControlAction::Start),
            "stop" => Some(ControlAction::Stop),
            "restart" => Some(ControlAction::Restart),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlAction::Start => "start",
            ControlAction::Stop => "stop",
            ControlAction::Restart => "restart",
        }
    }

    /// Whether a successful action invalidates the local event state.
    pub fn resets_session(&self) -> bool {
        matches!(self, ControlAction::Start | ControlAction::Restart)
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional body forwarded with start/restart requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlOptions {
    /// Interaction server the capture client should register with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Whether the backend should truncate its capture file on start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate: Option<bool>,
    /// Whether start should replace a capture client that is already running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

impl ControlOptions {
    pub fn is_empty(&self) -> bool {
        self.server.is_none() && self.truncate.is_none() && self.force.is_none()
    }
}

/// Answer of the backend status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub started_at: Option<f64>,
    #[serde(default)]
    pub log_tail: Vec<String>,
}

/// Error body shape used by the backend on non-2xx control answers.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct BackendErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
