use serde::{Deserialize, Serialize};

/// Default number of events kept in memory.
pub const DEFAULT_RETENTION_CAP: usize = 500;

/// What happens to the identity key of an evicted event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRetention {
    /// Keys outlive their events, so an evicted event is never accepted again until the
    /// next reset.
    #[default]
    Retain,
    /// Keys leave with their events, so an identical event may reappear after eviction.
    Purge,
}

/// Result of offering a live record to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Accepted,
    Duplicate,
}

impl AppendOutcome {
    pub fn is_accepted(self) -> bool {
        self == AppendOutcome::Accepted
    }
}
