use log::debug;
use regex::Regex;
use serde_json::Value;

use crate::event_model::{EventRecord, Protocol};
use crate::event_store::{AppendOutcome, EventStore, KeyRetention};
use crate::view::types::{DashboardView, ProtocolFilter};
use crate::view::{project, title_with_unread};

use super::types::ReconcilerPhase;

/// Everything the dashboard knows about the current session.
///
/// Owned by the reconciler task; the projector only ever borrows it.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub store: EventStore,
    pub filter: ProtocolFilter,
    pub unread_http: usize,
    pub visible: bool,
}

impl SessionState {
    pub fn new(retention_cap: usize, key_retention: KeyRetention) -> Self {
        Self {
            store: EventStore::new(retention_cap, key_retention),
            filter: ProtocolFilter::All,
            unread_http: 0,
            visible: true,
        }
    }

    /// Drops events, identity keys and the unread counter. The filter is kept.
    pub fn reset_session(&mut self) {
        self.store.reset();
        self.unread_http = 0;
    }

    /// Replaces the store content with a history answer. Records that are not JSON
    /// objects are skipped. Returns the number of retained events.
    pub fn load_snapshot(&mut self, values: Vec<Value>) -> usize {
        let records = values
            .into_iter()
            .filter_map(|value| match EventRecord::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("Skipping malformed history record: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();
        self.store.load_snapshot(records).count()
    }

    /// Offers one live message. `None` means it could not be parsed.
    pub fn accept_live(&mut self, data: &str) -> Option<AppendOutcome> {
        let record = match EventRecord::parse(data) {
            Ok(record) => record,
            Err(e) => {
                debug!("Dropping malformed live message: {}", e);
                return None;
            }
        };
        let is_http = record.protocol == Protocol::Http;
        let outcome = self.store.append_live(record);
        if outcome.is_accepted() && is_http && !self.visible {
            self.unread_http += 1;
        }
        Some(outcome)
    }

    pub fn set_visibility(&mut self, visible: bool) {
        self.visible = visible;
        if visible {
            self.unread_http = 0;
        }
    }

    pub fn project(&self, title: &str, payload_pattern: &Regex, phase: ReconcilerPhase) -> DashboardView {
        DashboardView {
            rows: project(self.store.events(), &self.filter),
            filter: self.filter.clone(),
            total: self.store.len(),
            unread_http: self.unread_http,
            title: title_with_unread(title, self.unread_http),
            phase,
            payload_hint: self
                .store
                .latest_matching_host(payload_pattern)
                .map(str::to_string),
        }
    }
}
