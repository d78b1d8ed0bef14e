//! Tokio driver for [`DraftMachine`].
//!
//! One task per draft owns the machine. It waits on three sources: commands
//! from the [`DraftHandle`], the debounce deadline and the single outstanding
//! fetch or save. Each event is fed to the machine and the resulting effects
//! are executed before the next event is taken, so at most one persistence
//! call is ever in flight for a draft.

use std::sync::Arc;

use hyperdraft_editor::{draft_changes, from_block_nodes};
use hyperdraft_types::DraftId;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DraftConfig;
use crate::machine::{
    DraftEvent, DraftMachine, Effect, Phase, SaveIndicator, SaveOutcome, SaveRequest,
};
use crate::store::{DraftStore, StoreError};
use crate::surface::EditorSurface;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Autosave coordinator for draft {0} has stopped")]
    Stopped(DraftId),
}

/// Snapshot published after every event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftStatus {
    pub phase: Phase,
    pub indicator: SaveIndicator,
    pub title: String,
    /// Most recent fetch or save failure, cleared by the next successful save
    pub last_error: Option<String>,
    pub saves_completed: u64,
}

impl DraftStatus {
    fn initial() -> Self {
        Self {
            phase: Phase::Fetching,
            indicator: SaveIndicator::Idle,
            title: String::new(),
            last_error: None,
            saves_completed: 0,
        }
    }
}

#[derive(Debug)]
enum Command {
    Change { title: Option<String> },
    Stop,
}

/// Caller side of a running coordinator
#[derive(Debug)]
pub struct DraftHandle {
    draft_id: DraftId,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<DraftStatus>,
    task: JoinHandle<()>,
}

impl DraftHandle {
    /// Notify the coordinator that the editor content (and optionally the
    /// title) changed.
    pub fn change(&self, title: Option<String>) -> Result<(), CoordinatorError> {
        self.commands
            .send(Command::Change { title })
            .map_err(|_| CoordinatorError::Stopped(self.draft_id.clone()))
    }

    /// Stop the coordinator. Pending timers are dropped and the result of an
    /// in-flight save is ignored.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    pub fn status(&self) -> DraftStatus {
        self.status.borrow().clone()
    }

    /// Wait until the published status satisfies `pred`.
    pub async fn wait_for(
        &self,
        pred: impl FnMut(&DraftStatus) -> bool,
    ) -> Result<DraftStatus, CoordinatorError> {
        let mut status = self.status.clone();
        let result = status
            .wait_for(pred)
            .await
            .map(|status| status.clone())
            .map_err(|_| CoordinatorError::Stopped(self.draft_id.clone()));
        result
    }

    /// Stop the coordinator and wait for its task to exit.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            warn!(draft = %self.draft_id, error = %e, "autosave task ended abnormally");
        }
    }
}

pub struct AutosaveCoordinator {
    draft_id: DraftId,
    store: Arc<dyn DraftStore>,
    surface: Arc<dyn EditorSurface>,
    machine: DraftMachine,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<DraftStatus>,
    last_error: Option<String>,
    deadline: Option<(Instant, u64)>,
    pending: Option<JoinHandle<DraftEvent>>,
}

impl AutosaveCoordinator {
    /// Start fetching `draft_id` and return a handle to the running
    /// coordinator. Must be called within a tokio runtime.
    pub fn spawn(
        draft_id: DraftId,
        store: Arc<dyn DraftStore>,
        surface: Arc<dyn EditorSurface>,
        config: DraftConfig,
    ) -> DraftHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(DraftStatus::initial());

        let coordinator = Self {
            draft_id: draft_id.clone(),
            store,
            surface,
            machine: DraftMachine::new(config.autosave_timeout),
            commands: command_rx,
            status: status_tx,
            last_error: None,
            deadline: None,
            pending: None,
        };
        let task = tokio::spawn(coordinator.run());

        DraftHandle {
            draft_id,
            commands: command_tx,
            status: status_rx,
            task,
        }
    }

    async fn run(mut self) {
        info!(draft = %self.draft_id, "starting autosave coordinator");
        self.start_fetch();

        loop {
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Change { title }) => DraftEvent::Change { title },
                    // All handles dropped.
                    Some(Command::Stop) | None => DraftEvent::Stop,
                },
                generation = wait_deadline(self.deadline) => {
                    self.deadline = None;
                    DraftEvent::AutosaveElapsed { generation }
                }
                joined = wait_pending(&mut self.pending) => {
                    self.pending = None;
                    joined.unwrap_or_else(|e| self.task_failed(e))
                }
            };

            for effect in self.machine.transition(event) {
                self.execute(effect);
            }
            self.publish();

            if self.machine.phase() == Phase::Stopped {
                break;
            }
        }

        info!(draft = %self.draft_id, "autosave coordinator stopped");
    }

    fn start_fetch(&mut self) {
        let store = Arc::clone(&self.store);
        let draft_id = self.draft_id.clone();
        self.pending = Some(tokio::spawn(async move {
            match store.fetch_draft(&draft_id).await {
                Ok(Some(doc)) => DraftEvent::FetchSucceeded(doc),
                Ok(None) => DraftEvent::FetchFailed(StoreError::NotFound(draft_id).to_string()),
                Err(e) => DraftEvent::FetchFailed(e.to_string()),
            }
        }));
    }

    fn task_failed(&self, error: JoinError) -> DraftEvent {
        let msg = format!("background task failed: {error}");
        match self.machine.phase() {
            Phase::Fetching => DraftEvent::FetchFailed(msg),
            _ => DraftEvent::SaveFailed(msg),
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::PopulateEditor(nodes) => {
                self.surface.replace_blocks(from_block_nodes(&nodes));
            }
            Effect::ScheduleAutosave { generation, delay } => {
                self.deadline = Some((Instant::now() + delay, generation));
            }
            Effect::Save(request) => self.start_save(request),
            Effect::Indicate(indicator) => {
                if indicator == SaveIndicator::Saved {
                    self.last_error = None;
                }
                self.status.send_modify(|status| status.indicator = indicator);
            }
            Effect::ReportError(failure) => {
                warn!(draft = %self.draft_id, error = %failure, "draft error");
                self.last_error = Some(failure.to_string());
            }
        }
    }

    /// Snapshot the editor and persist the diff against the baseline.
    fn start_save(&mut self, request: SaveRequest) {
        let blocks = self.surface.blocks();
        let store = Arc::clone(&self.store);
        let draft_id = self.draft_id.clone();

        self.pending = Some(tokio::spawn(async move {
            let changes = draft_changes(
                &request.baseline,
                &request.baseline_title,
                &request.title,
                &blocks,
            );
            if changes.is_empty() {
                debug!(draft = %draft_id, "editor matches baseline, nothing to save");
                return DraftEvent::SaveSucceeded(SaveOutcome::Unchanged);
            }

            match store.apply_changes(&draft_id, &changes).await {
                Ok(doc) => {
                    info!(draft = %draft_id, changes = changes.len(), "saved draft");
                    DraftEvent::SaveSucceeded(SaveOutcome::Saved(doc))
                }
                Err(e) => DraftEvent::SaveFailed(e.to_string()),
            }
        }));
    }

    fn publish(&self) {
        let phase = self.machine.phase();
        let title = self.machine.title().to_string();
        let saves_completed = self.machine.saves_completed();
        let last_error = self.last_error.clone();
        self.status.send_modify(|status| {
            status.phase = phase;
            status.title = title;
            status.saves_completed = saves_completed;
            status.last_error = last_error;
        });
    }
}

async fn wait_deadline(deadline: Option<(Instant, u64)>) -> u64 {
    match deadline {
        Some((at, generation)) => {
            tokio::time::sleep_until(at).await;
            generation
        }
        None => std::future::pending().await,
    }
}

async fn wait_pending(pending: &mut Option<JoinHandle<DraftEvent>>) -> Result<DraftEvent, JoinError> {
    match pending {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
