//! # Stream Reconciler
//!
//! Merges the history snapshot with the live feed into one deduplicated session state.
//!
//! ```text
//! ┌──────────────┐ commands  ┌──────────────────┐  views   ┌───────────────┐
//! │ Handle(s)    │──────────▶│ StreamReconciler │─────────▶│ watch channel │
//! └──────────────┘           │  (single task)   │          └───────────────┘
//! ┌──────────────┐ completions│                  │
//! │ fetch/control│──────────▶│ - SessionState   │
//! │ tasks        │           │ - generation     │
//! └──────────────┘           │                  │
//! ┌──────────────┐ live input│                  │
//! │ subscription │──────────▶│                  │
//! │ task         │           └──────────────────┘
//! └──────────────┘
//! ```
//!
//! Every network round-trip runs on its own task and reports back through a channel, so
//! the reconciler task is the only writer of the session state. A generation counter is
//! bumped on every snapshot load; completions and live input carrying an older
//! generation are discarded.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, trace, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::{Backend, ControlAction};
use crate::error_handling::types::ControlError;
use crate::view::types::{DashboardView, ProtocolFilter};

use super::session_state::SessionState;
use super::types::{Completion, LiveInput, ReconcilerPhase, ReconcilerSettings, UserCommand};

const COMMAND_CAPACITY: usize = 32;
const COMPLETION_CAPACITY: usize = 32;
const LIVE_CAPACITY: usize = 256;

pub struct StreamReconciler<B: Backend> {
    backend: Arc<B>,
    settings: ReconcilerSettings,
    state: SessionState,
    phase: ReconcilerPhase,
    generation: u64,
    subscription: Option<JoinHandle<()>>,
    commands: mpsc::Receiver<UserCommand>,
    completion_tx: mpsc::Sender<Completion>,
    completion_rx: mpsc::Receiver<Completion>,
    live_tx: mpsc::Sender<LiveInput>,
    live_rx: mpsc::Receiver<LiveInput>,
    view_tx: watch::Sender<DashboardView>,
}

impl<B: Backend> StreamReconciler<B> {
    pub fn new(backend: Arc<B>, settings: ReconcilerSettings) -> (Self, ReconcilerHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_CAPACITY);
        let (live_tx, live_rx) = mpsc::channel(LIVE_CAPACITY);
        let (view_tx, view_rx) = watch::channel(DashboardView::empty(&settings.title));

        let reconciler = Self {
            backend,
            state: SessionState::new(settings.retention_cap, settings.key_retention),
            settings,
            phase: ReconcilerPhase::Idle,
            generation: 0,
            subscription: None,
            commands,
            completion_tx,
            completion_rx,
            live_tx,
            live_rx,
            view_tx,
        };
        let handle = ReconcilerHandle {
            commands: command_tx,
            views: view_rx,
        };
        (reconciler, handle)
    }

    /// Runs until `shutdown` is requested or every handle is dropped.
    pub async fn run(mut self) {
        info!("Stream reconciler started");
        self.begin_snapshot();

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(UserCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.completion_rx.recv() => self.handle_completion(completion),
                Some(input) = self.live_rx.recv() => self.handle_live(input),
            }
        }

        self.teardown_subscription();
        self.phase = ReconcilerPhase::Closed;
        self.publish();
        info!("Stream reconciler stopped");
    }

    fn handle_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::Control { action, reply } => self.spawn_control(action, reply),
            UserCommand::Clear(ack) => {
                info!("Clearing {} local event(s)", self.state.store.len());
                self.state.reset_session();
                self.publish();
                let _ = ack.send(());
            }
            UserCommand::SetFilter(filter, ack) => {
                debug!("Filter set to {}", filter);
                self.state.filter = filter;
                self.publish();
                let _ = ack.send(());
            }
            UserCommand::SetVisibility(visible, ack) => {
                self.state.set_visibility(visible);
                self.publish();
                let _ = ack.send(());
            }
            UserCommand::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Snapshot { generation, result } => {
                if generation != self.generation {
                    debug!(
                        "Discarding snapshot of generation {} (current {})",
                        generation, self.generation
                    );
                    return;
                }
                match result {
                    Ok(values) => {
                        let offered = values.len();
                        let retained = self.state.load_snapshot(values);
                        info!("Snapshot loaded: {} of {} record(s) retained", retained, offered);
                    }
                    Err(e) => warn!("Unable to load history, starting empty: {}", e),
                }
                self.open_subscription();
                self.publish();
            }
            Completion::Control {
                action,
                result,
                reply,
            } => {
                match &result {
                    Ok(()) => {
                        info!("Backend accepted {}", action);
                        if action.resets_session() {
                            self.state.reset_session();
                        }
                        if action == ControlAction::Restart {
                            self.begin_snapshot();
                        }
                        self.publish();
                    }
                    Err(e) => warn!("{}", e),
                }
                let _ = reply.send(result);
            }
        }
    }

    fn handle_live(&mut self, input: LiveInput) {
        if input.generation() != self.generation {
            trace!(
                "Discarding live input of generation {} (current {})",
                input.generation(),
                self.generation
            );
            return;
        }
        match input {
            LiveInput::Connected { .. } => {
                self.phase = ReconcilerPhase::Subscribed {
                    reconnecting: false,
                };
                self.publish();
            }
            LiveInput::Dropped { .. } => {
                self.phase = ReconcilerPhase::Subscribed { reconnecting: true };
                self.publish();
            }
            LiveInput::Message { data, .. } => {
                if let Some(outcome) = self.state.accept_live(&data) {
                    if outcome.is_accepted() {
                        self.publish();
                    } else {
                        trace!("Duplicate live event ignored");
                    }
                }
            }
        }
    }

    /// Tears the subscription down and requests a fresh history under a new generation.
    fn begin_snapshot(&mut self) {
        self.teardown_subscription();
        self.generation += 1;
        self.phase = ReconcilerPhase::LoadingSnapshot;
        self.publish();

        let generation = self.generation;
        let backend = self.backend.clone();
        let completion_tx = self.completion_tx.clone();
        debug!("Loading snapshot (generation {})", generation);
        tokio::spawn(async move {
            let result = backend.fetch_history().await;
            let _ = completion_tx
                .send(Completion::Snapshot { generation, result })
                .await;
        });
    }

    fn open_subscription(&mut self) {
        self.teardown_subscription();
        self.phase = ReconcilerPhase::Subscribed {
            reconnecting: false,
        };
        let task = subscription_loop(
            self.backend.clone(),
            self.generation,
            self.live_tx.clone(),
            self.settings.reconnect_delay,
        );
        self.subscription = Some(tokio::spawn(task));
    }

    fn teardown_subscription(&mut self) {
        if let Some(task) = self.subscription.take() {
            debug!("Tearing down live subscription");
            task.abort();
        }
    }

    fn spawn_control(
        &self,
        action: ControlAction,
        reply: oneshot::Sender<Result<(), ControlError>>,
    ) {
        let backend = self.backend.clone();
        let options = self.settings.control_options.clone();
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = backend.control(action, &options).await;
            let _ = completion_tx
                .send(Completion::Control {
                    action,
                    result,
                    reply,
                })
                .await;
        });
    }

    fn publish(&self) {
        let view = self.state.project(
            &self.settings.title,
            &self.settings.payload_pattern,
            self.phase,
        );
        self.view_tx.send_replace(view);
    }
}

impl<B: Backend> Drop for StreamReconciler<B> {
    fn drop(&mut self) {
        self.teardown_subscription();
    }
}

/// Keeps one live subscription open, reconnecting after `reconnect_delay` whenever it
/// drops. Never fetches history.
async fn subscription_loop<B: Backend>(
    backend: Arc<B>,
    generation: u64,
    live_tx: mpsc::Sender<LiveInput>,
    reconnect_delay: Duration,
) {
    loop {
        let id = Uuid::new_v4();
        match backend.subscribe().await {
            Ok(mut feed) => {
                info!("[{}] Live subscription opened", id);
                if live_tx.send(LiveInput::Connected { generation }).await.is_err() {
                    return;
                }
                while let Some(item) = feed.next().await {
                    match item {
                        Ok(data) => {
                            let message = LiveInput::Message { generation, data };
                            if live_tx.send(message).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!("[{}] Live subscription failed: {}", id, e);
                            break;
                        }
                    }
                }
                info!("[{}] Live subscription closed", id);
            }
            Err(e) => warn!("[{}] Unable to open live subscription: {}", id, e),
        }

        if live_tx.send(LiveInput::Dropped { generation }).await.is_err() {
            return;
        }
        debug!("Reconnecting in {:?}", reconnect_delay);
        tokio::time::sleep(reconnect_delay).await;
    }
}

/// Cloneable front of a running `StreamReconciler`.
#[derive(Debug, Clone)]
pub struct ReconcilerHandle {
    commands: mpsc::Sender<UserCommand>,
    views: watch::Receiver<DashboardView>,
}

impl ReconcilerHandle {
    /// Forwards a control action and waits for the backend's answer. Local state is only
    /// touched when the backend accepts.
    pub async fn control(&self, action: ControlAction) -> Result<(), ControlError> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(UserCommand::Control { action, reply })
            .await
            .map_err(|_| ControlError::ReconcilerUnavailable)?;
        answer
            .await
            .map_err(|_| ControlError::ReconcilerUnavailable)?
    }

    pub async fn clear(&self) -> Result<(), ControlError> {
        self.acknowledged(UserCommand::Clear).await
    }

    pub async fn set_filter(&self, filter: ProtocolFilter) -> Result<(), ControlError> {
        self.acknowledged(|ack| UserCommand::SetFilter(filter, ack))
            .await
    }

    pub async fn set_visibility(&self, visible: bool) -> Result<(), ControlError> {
        self.acknowledged(|ack| UserCommand::SetVisibility(visible, ack))
            .await
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(UserCommand::Shutdown).await;
    }

    /// Latest published view.
    pub fn view(&self) -> DashboardView {
        self.views.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<DashboardView> {
        self.views.clone()
    }

    async fn acknowledged<F>(&self, command: F) -> Result<(), ControlError>
    where
        F: FnOnce(oneshot::Sender<()>) -> UserCommand,
    {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(command(ack))
            .await
            .map_err(|_| ControlError::ReconcilerUnavailable)?;
        done.await.map_err(|_| ControlError::ReconcilerUnavailable)
    }
}
