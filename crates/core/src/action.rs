// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`Action`] and its state machine — the smallest unit of work an
//! [`ActionExecutor`](crate) runs, and the hard scheduling substrate for
//! [`CompoundJob`](crate::compound_job::CompoundJob).

use crate::failure::FailureCause;
use crate::file_location::FileLocation;
use crate::ids::{ActionId, HostId};
use serde::{Deserialize, Serialize};

/// What an action actually does when it runs. The built-in kinds are a
/// closed tag-switch (Design Notes §9: "tag-switch for built-ins"); only
/// `Custom` reaches for dynamic dispatch, since its set is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Sleep { duration_secs: f64 },
    Compute { flops: f64 },
    FileRead { location: FileLocation },
    FileWrite { location: FileLocation },
    FileCopy { src: FileLocation, dst: FileLocation },
    FileDelete { location: FileLocation },
    /// An opaque action whose body is supplied by the caller. Not
    /// (de)serializable — custom actions never cross a wire boundary.
    #[serde(skip)]
    Custom(CustomActionTag),
}

/// Placeholder payload for `ActionKind::Custom` — the real body is a
/// `Box<dyn Fn(...) -> Result<(), FailureCause>>` supplied by an
/// `ExecutionController`, held one layer up (in `wrench-services`) since
/// `wrench-core` must stay free of execution-environment types. This tag
/// only carries a name for logging/traces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomActionTag(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    NotReady,
    Ready,
    Started,
    Completed,
    Failed,
    Killed,
}

crate::simple_display! {
    ActionState {
        NotReady => "not_ready",
        Ready => "ready",
        Started => "started",
        Completed => "completed",
        Failed => "failed",
        Killed => "killed",
    }
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionState::Completed | ActionState::Failed | ActionState::Killed)
    }
}

/// One past attempt at running an action, pushed to `execution_history`
/// oldest-first whenever the action re-enters `STARTED` from `READY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionAttempt {
    pub start_date: f64,
    pub end_date: f64,
    pub allocated_cores: u32,
    pub allocated_ram: u64,
    pub execution_host: Option<HostId>,
    pub outcome: ActionState,
    pub failure_cause: Option<FailureCause>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub kind: ActionKind,
    pub min_cores: u32,
    pub max_cores: u32,
    pub ram_footprint: u64,
    pub priority: i64,
    pub state: ActionState,
    pub parents: Vec<ActionId>,
    pub children: Vec<ActionId>,
    pub execution_history: Vec<ActionAttempt>,
    pub start_date: Option<f64>,
    pub end_date: Option<f64>,
    pub failure_cause: Option<FailureCause>,
    pub allocated_cores: u32,
    pub allocated_ram: u64,
    pub execution_host: Option<HostId>,
}

impl Action {
    pub fn new(kind: ActionKind, min_cores: u32, max_cores: u32, ram_footprint: u64, priority: i64) -> Self {
        Self {
            id: ActionId::new(),
            kind,
            min_cores,
            max_cores: max_cores.max(min_cores),
            ram_footprint,
            priority,
            // No parents yet at construction time (they're attached later
            // via `CompoundJob::add_dependency`, which downgrades this to
            // `NotReady` itself if a parent is actually added).
            state: Action::initial_state(false),
            parents: Vec::new(),
            children: Vec::new(),
            execution_history: Vec::new(),
            start_date: None,
            end_date: None,
            failure_cause: None,
            allocated_cores: 0,
            allocated_ram: 0,
            execution_host: None,
        }
    }

    /// Actions with zero parents start READY (spec.md §4.6).
    pub fn initial_state(has_parents: bool) -> ActionState {
        if has_parents { ActionState::NotReady } else { ActionState::Ready }
    }

    /// Begin a new execution attempt: STARTED, resource bookkeeping, and
    /// `start_date`. `start_date` strictly increases across retries
    /// (INV from spec.md §5) because the caller always passes the
    /// kernel's current simulated time, which only moves forward.
    pub fn begin_attempt(&mut self, now: f64, cores: u32, ram: u64, host: HostId) {
        self.state = ActionState::Started;
        self.start_date = Some(now);
        self.end_date = None;
        self.allocated_cores = cores;
        self.allocated_ram = ram;
        self.execution_host = Some(host);
    }

    /// Finalize the current attempt, push it to history, and set the
    /// terminal-or-ready-again state.
    pub fn finish_attempt(&mut self, now: f64, outcome: ActionState, cause: Option<FailureCause>) {
        self.end_date = Some(now);
        self.execution_history.push(ActionAttempt {
            start_date: self.start_date.unwrap_or(now),
            end_date: now,
            allocated_cores: self.allocated_cores,
            allocated_ram: self.allocated_ram,
            execution_host: self.execution_host,
            outcome,
            failure_cause: cause.clone(),
        });
        self.state = outcome;
        self.failure_cause = cause;
    }

    /// Re-arm the action for another attempt (executor-crash retry path).
    pub fn retry(&mut self) {
        self.state = ActionState::Ready;
        self.failure_cause = None;
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
