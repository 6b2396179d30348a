use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;

use crate::backend::{Backend, StatusReport};

/// Last known state of the capture process.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusView {
    /// Whether the last poll reached the backend.
    pub reachable: bool,
    pub running: bool,
    pub payload: Option<String>,
    pub started_at: Option<f64>,
    pub log_tail: Vec<String>,
    pub last_error: Option<String>,
}

impl StatusView {
    fn from_report(report: StatusReport) -> Self {
        Self {
            reachable: true,
            running: report.running,
            payload: report.payload.filter(|p| !p.is_empty()),
            started_at: report.started_at,
            log_tail: report.log_tail,
            last_error: None,
        }
    }

    /// Uses `hint` when the backend reported no payload.
    pub fn with_payload_hint(mut self, hint: Option<String>) -> Self {
        if self.payload.is_none() {
            self.payload = hint;
        }
        self
    }
}

/// Polls the status endpoint on a fixed interval, independently of event data.
pub struct StatusPoller<B: Backend> {
    backend: Arc<B>,
    interval: Duration,
    refresh: Arc<Notify>,
    status_tx: watch::Sender<StatusView>,
}

#[derive(Debug, Clone)]
pub struct StatusHandle {
    refresh: Arc<Notify>,
    status_rx: watch::Receiver<StatusView>,
}

impl StatusHandle {
    /// Asks for a poll now rather than at the next tick.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    pub fn current(&self) -> StatusView {
        self.status_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<StatusView> {
        self.status_rx.clone()
    }
}

impl<B: Backend> StatusPoller<B> {
    pub fn new(backend: Arc<B>, interval: Duration) -> (Self, StatusHandle) {
        let (status_tx, status_rx) = watch::channel(StatusView::default());
        let refresh = Arc::new(Notify::new());
        let poller = Self {
            backend,
            interval,
            refresh: refresh.clone(),
            status_tx,
        };
        (poller, StatusHandle { refresh, status_rx })
    }

    /// Runs until every `StatusHandle` is dropped.
    pub async fn run(self) {
        info!("Status poller started ({:?} interval)", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.status_tx.closed() => break,
                _ = ticker.tick() => {}
                _ = self.refresh.notified() => debug!("Status refresh requested"),
            }
            self.poll_once().await;
        }
        info!("Status poller stopped");
    }

    pub async fn poll_once(&self) {
        match self.backend.fetch_status().await {
            Ok(report) => {
                if !self.status_tx.borrow().reachable {
                    info!("Backend status reachable");
                }
                self.status_tx.send_replace(StatusView::from_report(report));
            }
            Err(e) => {
                if self.status_tx.borrow().reachable {
                    warn!("Backend status unreachable: {}", e);
                } else {
                    debug!("Backend status still unreachable: {}", e);
                }
                self.status_tx.send_modify(|status| {
                    status.reachable = false;
                    status.last_error = Some(e.to_string());
                });
            }
        }
    }
}
