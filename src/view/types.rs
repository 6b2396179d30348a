use std::fmt;

use serde::{Serialize, Serializer};

use crate::event_model::Protocol;
use crate::reconciler::types::ReconcilerPhase;

/// Placeholder shown wherever a field is unknown.
pub const PLACEHOLDER: &str = "—";

/// Protocol filter applied by the projector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProtocolFilter {
    #[default]
    All,
    /// Uppercased protocol label to keep.
    Only(String),
}

impl ProtocolFilter {
    /// `ALL` (any case) or an empty name selects everything; anything else is a label.
    pub fn parse(name: &str) -> Self {
        let upper = name.trim().to_uppercase();
        if upper.is_empty() || upper == "ALL" {
            ProtocolFilter::All
        } else {
            ProtocolFilter::Only(upper)
        }
    }

    pub fn matches(&self, protocol: &Protocol) -> bool {
        match self {
            ProtocolFilter::All => true,
            ProtocolFilter::Only(label) => protocol.as_str() == label,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProtocolFilter::All => "ALL",
            ProtocolFilter::Only(label) => label.as_str(),
        }
    }
}

impl fmt::Display for ProtocolFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProtocolFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Expanded content of a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum DetailBody {
    /// Preformatted request text.
    Text(String),
    /// Labelled values, in display order.
    Fields(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detail {
    pub summary: String,
    pub body: DetailBody,
}

/// One rendered line of the event table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub time: String,
    pub source: String,
    pub host_or_query: String,
    pub protocol: String,
    pub badge_class: &'static str,
    pub detail: Option<Detail>,
}

/// Published projection of the session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// Newest first.
    pub rows: Vec<Row>,
    pub filter: ProtocolFilter,
    /// Retained events before filtering.
    pub total: usize,
    pub unread_http: usize,
    pub title: String,
    pub phase: ReconcilerPhase,
    /// Most recent retained host matching the payload pattern.
    pub payload_hint: Option<String>,
}

impl DashboardView {
    pub fn empty(title: &str) -> Self {
        Self {
            rows: Vec::new(),
            filter: ProtocolFilter::All,
            total: 0,
            unread_http: 0,
            title: title.to_string(),
            phase: ReconcilerPhase::Idle,
            payload_hint: None,
        }
    }
}
