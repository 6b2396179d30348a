use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::types::ControlOptions;
use crate::event_store::{KeyRetention, DEFAULT_RETENTION_CAP};

/// Where the capture backend lives and how to reach each of its endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Origin of the backend, e.g. `http://127.0.0.1:5000`
    pub base_url: String,
    pub history_path: String,
    pub status_path: String,
    pub stream_path: String,
    pub start_path: String,
    pub stop_path: String,
    pub restart_path: String,
    /// Applies to every request except the live stream
    pub request_timeout_secs: u64,
    /// Forwarded as JSON body with start/restart when non-empty
    pub control: ControlOptions,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            history_path: "/api/last".to_string(),
            status_path: "/api/status".to_string(),
            stream_path: "/stream".to_string(),
            start_path: "/api/start".to_string(),
            stop_path: "/api/stop".to_string(),
            restart_path: "/api/restart".to_string(),
            request_timeout_secs: 10,
            control: ControlOptions::default(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebUiConfig {
    pub bind_address: String,
    pub port: u16,
    /// Base window title; the unread counter is prefixed to it
    pub title: String,
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            title: "Interactsh Monitor".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub retention_cap: usize,
    pub key_retention: KeyRetention,
    /// Pause between a dropped live connection and the next attempt
    pub reconnect_delay_ms: u64,
    /// Hosts matching this are offered as payload when the backend reports none
    pub payload_host_pattern: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retention_cap: DEFAULT_RETENTION_CAP,
            key_retention: KeyRetention::default(),
            reconnect_delay_ms: 3000,
            payload_host_pattern: r"(?i)\.oast\.(?:pro|live)\.?$".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub poll_interval_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
        }
    }
}
