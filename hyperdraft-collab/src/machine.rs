//! Autosave state machine for a single draft.
//!
//! The machine is pure: [`DraftMachine::transition`] consumes one event and
//! returns the effects the caller must execute (populate the editor, arm the
//! debounce timer, start a save, update the save indicator). Timers and
//! persistence live in the coordinator.
//!
//! A draft starts in `Fetching` and moves to `Ready(Idle)` once loaded, or to
//! the terminal `Error` state. Edits move it to `Ready(Changed)`, where every
//! further edit restarts the debounce. When the debounce fires the draft is
//! saved; edits that arrive during a save are captured by an immediate second
//! save once the first completes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hyperdraft_editor::{flatten, BlocksMap};
use hyperdraft_types::{BlockNode, Document};
use tracing::{debug, warn};

/// Sub-state while the draft is loaded and editable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyPhase {
    Idle,
    Changed,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Ready(ReadyPhase),
    /// The draft could not be loaded; terminal
    Error,
    /// The coordinator was shut down; every later event is ignored
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Fetching => f.write_str("fetching"),
            Phase::Ready(ReadyPhase::Idle) => f.write_str("ready.idle"),
            Phase::Ready(ReadyPhase::Changed) => f.write_str("ready.changed"),
            Phase::Ready(ReadyPhase::Saving) => f.write_str("ready.saving"),
            Phase::Error => f.write_str("error"),
            Phase::Stopped => f.write_str("stopped"),
        }
    }
}

/// User-visible save status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveIndicator {
    #[default]
    Idle,
    Changed,
    Saving,
    Saved,
    Error,
}

/// Result of a persistence round trip
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The editor tree matched the baseline; nothing was sent
    Unchanged,
    /// The store accepted the changes and returned the updated draft
    Saved(Document),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DraftEvent {
    FetchSucceeded(Document),
    FetchFailed(String),
    /// Title edit or content change in the editor
    Change { title: Option<String> },
    AutosaveElapsed { generation: u64 },
    SaveSucceeded(SaveOutcome),
    SaveFailed(String),
    Stop,
}

/// Everything a save needs besides the live editor tree
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub baseline: Arc<BlocksMap>,
    pub baseline_title: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftFailure {
    Fetch(String),
    Save(String),
}

impl fmt::Display for DraftFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftFailure::Fetch(msg) => write!(f, "failed to load draft: {msg}"),
            DraftFailure::Save(msg) => write!(f, "failed to save draft: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PopulateEditor(Vec<BlockNode>),
    /// Arm the debounce timer; only the latest generation may fire
    ScheduleAutosave { generation: u64, delay: Duration },
    Save(SaveRequest),
    Indicate(SaveIndicator),
    ReportError(DraftFailure),
}

#[derive(Debug, Clone)]
pub struct DraftMachine {
    phase: Phase,
    autosave_timeout: Duration,
    baseline: Arc<BlocksMap>,
    baseline_title: String,
    title: String,
    generation: u64,
    changed_while_saving: bool,
    saves_completed: u64,
}

impl DraftMachine {
    pub fn new(autosave_timeout: Duration) -> Self {
        Self {
            phase: Phase::Fetching,
            autosave_timeout,
            baseline: Arc::new(BlocksMap::new()),
            baseline_title: String::new(),
            title: String::new(),
            generation: 0,
            changed_while_saving: false,
            saves_completed: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn baseline(&self) -> &BlocksMap {
        &self.baseline
    }

    pub fn baseline_title(&self) -> &str {
        &self.baseline_title
    }

    pub fn saves_completed(&self) -> u64 {
        self.saves_completed
    }

    pub fn transition(&mut self, event: DraftEvent) -> Vec<Effect> {
        let from = self.phase;
        let effects = match (from, event) {
            (Phase::Stopped, _) => Vec::new(),
            (_, DraftEvent::Stop) => {
                self.phase = Phase::Stopped;
                Vec::new()
            }

            (Phase::Fetching, DraftEvent::FetchSucceeded(doc)) => {
                self.baseline = Arc::new(flatten(&doc.children, ""));
                self.baseline_title = doc.title.clone();
                self.title = doc.title;
                self.phase = Phase::Ready(ReadyPhase::Idle);
                vec![
                    Effect::PopulateEditor(doc.children),
                    Effect::Indicate(SaveIndicator::Idle),
                ]
            }
            (Phase::Fetching, DraftEvent::FetchFailed(msg)) => {
                self.phase = Phase::Error;
                vec![
                    Effect::ReportError(DraftFailure::Fetch(msg)),
                    Effect::Indicate(SaveIndicator::Error),
                ]
            }

            (Phase::Ready(ready), DraftEvent::Change { title }) => {
                if let Some(title) = title {
                    self.title = title;
                }
                match ready {
                    ReadyPhase::Idle | ReadyPhase::Changed => self.enter_changed(),
                    ReadyPhase::Saving => {
                        self.changed_while_saving = true;
                        Vec::new()
                    }
                }
            }
            (Phase::Ready(ReadyPhase::Changed), DraftEvent::AutosaveElapsed { generation })
                if generation == self.generation =>
            {
                self.enter_saving()
            }

            (Phase::Ready(ReadyPhase::Saving), DraftEvent::SaveSucceeded(outcome)) => {
                self.saves_completed += 1;
                if let SaveOutcome::Saved(doc) = outcome {
                    self.baseline = Arc::new(flatten(&doc.children, ""));
                    self.baseline_title = doc.title;
                }
                let mut effects = vec![Effect::Indicate(SaveIndicator::Saved)];
                if self.changed_while_saving {
                    effects.extend(self.enter_saving());
                } else {
                    self.phase = Phase::Ready(ReadyPhase::Idle);
                }
                effects
            }
            (Phase::Ready(ReadyPhase::Saving), DraftEvent::SaveFailed(msg)) => {
                warn!(error = %msg, "autosave failed, keeping previous baseline");
                let mut effects = vec![
                    Effect::ReportError(DraftFailure::Save(msg)),
                    Effect::Indicate(SaveIndicator::Error),
                ];
                if self.changed_while_saving {
                    effects.extend(self.enter_changed());
                } else {
                    self.phase = Phase::Ready(ReadyPhase::Idle);
                }
                effects
            }

            (_, event) => {
                debug!(phase = %from, ?event, "ignoring event");
                Vec::new()
            }
        };

        if self.phase != from {
            debug!(from = %from, to = %self.phase, "draft phase changed");
        }
        effects
    }

    /// Enter (or re-enter) `changed`, restarting the debounce.
    fn enter_changed(&mut self) -> Vec<Effect> {
        self.phase = Phase::Ready(ReadyPhase::Changed);
        self.generation += 1;
        vec![
            Effect::Indicate(SaveIndicator::Changed),
            Effect::ScheduleAutosave {
                generation: self.generation,
                delay: self.autosave_timeout,
            },
        ]
    }

    fn enter_saving(&mut self) -> Vec<Effect> {
        self.phase = Phase::Ready(ReadyPhase::Saving);
        self.changed_while_saving = false;
        vec![
            Effect::Indicate(SaveIndicator::Saving),
            Effect::Save(SaveRequest {
                baseline: Arc::clone(&self.baseline),
                baseline_title: self.baseline_title.clone(),
                title: self.title.clone(),
            }),
        ]
    }
}
