//! Per-run view records and the epoch that guards them.
//!
//! The board holds exactly one set of results at a time. Each run gets a
//! [`RunToken`] stamped with its epoch; every mutation goes through
//! [`RunToken::apply`], which checks the stamp and mutates under the same lock,
//! so a superseded run can never touch the current run's records.

use crate::submit::Rendered;
use crate::view::AngleView;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStatus {
    Queued,
    Running,
    Done,
    Error,
}

/// Outcome record for one view of the current run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AngleResult {
    pub id: String,
    #[serde(flatten)]
    pub view: AngleView,
    pub status: ViewStatus,
    pub image: Option<String>,
    pub seed: Option<i64>,
    pub error: Option<String>,
}

impl AngleResult {
    fn queued(epoch: u64, index: usize, view: AngleView) -> Self {
        Self {
            id: format!("{epoch}-{index}"),
            view,
            status: ViewStatus::Queued,
            image: None,
            seed: None,
            error: None,
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Point-in-time copy of the board, handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub epoch: u64,
    pub phase: RunPhase,
    pub status_text: String,
    pub results: Vec<AngleResult>,
    pub done: usize,
    pub failed: usize,
    pub total: usize,
}

/// Mutable run state. Only reachable through a current [`RunToken`] or the
/// board itself.
#[derive(Debug)]
pub struct RunState {
    epoch: u64,
    phase: RunPhase,
    status_text: String,
    results: Vec<AngleResult>,
}

impl RunState {
    fn new() -> Self {
        Self {
            epoch: 0,
            phase: RunPhase::Idle,
            status_text: String::new(),
            results: Vec::new(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn results(&self) -> &[AngleResult] {
        &self.results
    }

    pub fn mark_running(&mut self, index: usize) {
        if let Some(result) = self.results.get_mut(index) {
            result.status = ViewStatus::Running;
        }
    }

    /// Binds the first rendered image and marks the view done.
    pub fn bind(&mut self, index: usize, rendered: &Rendered) {
        if let Some(result) = self.results.get_mut(index) {
            result.status = ViewStatus::Done;
            result.image = Some(rendered.first().to_string());
            result.seed = rendered.seed();
            result.error = None;
        }
    }

    /// Marks the view failed. The message also becomes the run's status text.
    pub fn fail(&mut self, index: usize, message: String) {
        if let Some(result) = self.results.get_mut(index) {
            result.status = ViewStatus::Error;
            result.error = Some(message.clone());
            self.status_text = message;
        }
    }

    /// Settles the run once every view task has returned.
    pub fn finish(&mut self) -> RunPhase {
        let done = self.count(ViewStatus::Done);
        if self.results.is_empty() || done > 0 {
            self.phase = RunPhase::Completed;
            self.status_text = "Completed.".into();
        } else {
            self.phase = RunPhase::Failed;
        }
        self.phase
    }

    fn count(&self, status: ViewStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            epoch: self.epoch,
            phase: self.phase,
            status_text: self.status_text.clone(),
            results: self.results.clone(),
            done: self.count(ViewStatus::Done),
            failed: self.count(ViewStatus::Error),
            total: self.results.len(),
        }
    }
}

struct Inner {
    state: Mutex<RunState>,
    updates: watch::Sender<RunSnapshot>,
}

/// Shared handle to the single visible set of run results.
#[derive(Clone)]
pub struct RunBoard {
    inner: Arc<Inner>,
}

impl RunBoard {
    pub fn new() -> Self {
        let state = RunState::new();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                updates,
            }),
        }
    }

    /// Supersedes whatever run is current and resets the board to one queued
    /// record per view, in view order.
    pub fn begin(&self, views: &[AngleView]) -> RunToken {
        let mut state = self.inner.state.lock();
        state.epoch += 1;
        let epoch = state.epoch;
        state.phase = RunPhase::Running;
        state.status_text = format!("Rendering {} angles...", views.len());
        state.results = views
            .iter()
            .enumerate()
            .map(|(index, view)| AngleResult::queued(epoch, index, *view))
            .collect();
        self.inner.updates.send_replace(state.snapshot());

        RunToken {
            epoch,
            board: self.clone(),
        }
    }

    /// Invalidates the current run without starting another. Results already
    /// bound stay visible.
    pub fn cancel(&self) -> u64 {
        let mut state = self.inner.state.lock();
        state.epoch += 1;
        if state.phase == RunPhase::Running {
            state.phase = RunPhase::Cancelled;
            state.status_text = "Cancelled.".into();
        }
        self.inner.updates.send_replace(state.snapshot());
        state.epoch
    }

    pub fn current_epoch(&self) -> u64 {
        self.inner.state.lock().epoch
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Receives a fresh snapshot after every accepted mutation.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.inner.updates.subscribe()
    }
}

impl Default for RunBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// Generation stamp handed to every task of one run.
#[derive(Clone)]
pub struct RunToken {
    epoch: u64,
    board: RunBoard,
}

impl RunToken {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.board.current_epoch() == self.epoch
    }

    /// Runs `f` against the board if this token's run is still current.
    ///
    /// The epoch check and the mutation happen under one lock. Returns `None`
    /// and leaves the board untouched when the run has been superseded.
    pub fn apply<R>(&self, f: impl FnOnce(&mut RunState) -> R) -> Option<R> {
        let mut state = self.board.inner.state.lock();
        if state.epoch != self.epoch {
            return None;
        }
        let out = f(&mut *state);
        self.board.inner.updates.send_replace(state.snapshot());
        Some(out)
    }
}
