// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`SimulationTrace`]: the ordered, typed event trace a simulation run
//! produces (spec.md §6) — `TaskStart`/`TaskCompletion`/..., `FileRead*`,
//! `FileWrite*`, `FileCopy*`, `DiskRead*`, `DiskWrite*`, `PstateSet`,
//! `EnergyConsumption`, `LinkUsage`. Every paired start/end entry carries
//! a `counterpart` pointer to the other half so a consumer can
//! reconstruct an episode (e.g. one task's run) without re-matching
//! entries by id — the end entry is written with the start's id already
//! known, and the start entry is backfilled once the end is recorded.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use wrench_core::{FileId, HostId, TaskId};

/// A stable handle to one recorded trace entry, used to close out an
/// episode it opened (`SimulationTrace::end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceEntryId(u64);

/// The tagged event kinds spec.md §6 enumerates. `Task*`/`FileRead*`/
/// `FileWrite*`/`FileCopy*`/`DiskRead*`/`DiskWrite*` are episode kinds
/// (opened with `start`, closed with `end`); `PstateSet`,
/// `EnergyConsumption`, and `LinkUsage` are instants with no counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEventKind {
    TaskStart,
    TaskCompletion,
    TaskFailure,
    TaskTermination,
    FileReadStart,
    FileReadCompletion,
    FileReadFailure,
    FileWriteStart,
    FileWriteCompletion,
    FileWriteFailure,
    FileCopyStart,
    FileCopyCompletion,
    FileCopyFailure,
    DiskReadStart,
    DiskReadCompletion,
    DiskWriteStart,
    DiskWriteCompletion,
    PstateSet,
    EnergyConsumption,
    LinkUsage,
}

impl TraceEventKind {
    /// Whether this kind opens an episode that `SimulationTrace::end`
    /// will later close, as opposed to an instant with no counterpart.
    pub fn is_episode_start(&self) -> bool {
        matches!(
            self,
            TraceEventKind::TaskStart
                | TraceEventKind::FileReadStart
                | TraceEventKind::FileWriteStart
                | TraceEventKind::FileCopyStart
                | TraceEventKind::DiskReadStart
                | TraceEventKind::DiskWriteStart
        )
    }
}

/// One recorded moment in the trace. `host` is set for disk/energy/
/// pstate/link entries; `task`/`file` are set where the underlying
/// action concerns one.
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub id: TraceEntryId,
    pub kind: TraceEventKind,
    pub timestamp: f64,
    pub task: Option<TaskId>,
    pub file: Option<FileId>,
    pub host: Option<HostId>,
    /// The other half of this entry's episode, once both ends are
    /// recorded. `None` for an instant kind, or for a start entry whose
    /// matching end hasn't happened yet.
    pub counterpart: Option<TraceEntryId>,
}

#[derive(Default)]
struct TraceState {
    entries: Vec<TraceEntry>,
}

/// Append-only recorder shared (behind an `Arc`) across every actor that
/// might contribute a trace entry — services, executors, the platform's
/// fault-injection hooks.
#[derive(Default)]
pub struct SimulationTrace {
    state: Mutex<TraceState>,
    next_id: AtomicU64,
}

impl SimulationTrace {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> TraceEntryId {
        TraceEntryId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Record a standalone instant (`PstateSet`, `EnergyConsumption`,
    /// `LinkUsage`) with no counterpart.
    pub fn record_instant(&self, kind: TraceEventKind, timestamp: f64, host: Option<HostId>) -> TraceEntryId {
        let id = self.allocate_id();
        self.state.lock().entries.push(TraceEntry { id, kind, timestamp, task: None, file: None, host, counterpart: None });
        id
    }

    /// Open an episode (a `*Start` kind), returning the id `end` needs to
    /// close it out.
    pub fn start(
        &self,
        kind: TraceEventKind,
        timestamp: f64,
        task: Option<TaskId>,
        file: Option<FileId>,
        host: Option<HostId>,
    ) -> TraceEntryId {
        debug_assert!(kind.is_episode_start(), "trace::start called with a non-start kind");
        let id = self.allocate_id();
        self.state.lock().entries.push(TraceEntry { id, kind, timestamp, task, file, host, counterpart: None });
        id
    }

    /// Close an episode opened by `start`: records the end entry and
    /// backfills both entries' `counterpart` pointer to the other.
    pub fn end(&self, start_id: TraceEntryId, kind: TraceEventKind, timestamp: f64) -> TraceEntryId {
        debug_assert!(!kind.is_episode_start(), "trace::end called with a start kind");
        let end_id = self.allocate_id();
        let mut state = self.state.lock();
        let (task, file, host) = state
            .entries
            .iter()
            .find(|e| e.id == start_id)
            .map(|e| (e.task, e.file, e.host))
            .unwrap_or((None, None, None));
        state.entries.push(TraceEntry { id: end_id, kind, timestamp, task, file, host, counterpart: Some(start_id) });
        if let Some(start_entry) = state.entries.iter_mut().find(|e| e.id == start_id) {
            start_entry.counterpart = Some(end_id);
        }
        end_id
    }

    /// All recorded entries, oldest first (ties broken by recording
    /// order, which is also id order since ids are handed out
    /// monotonically).
    pub fn entries(&self) -> Vec<TraceEntry> {
        let mut entries = self.state.lock().entries.clone();
        entries.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap_or(std::cmp::Ordering::Equal).then(a.id.0.cmp(&b.id.0)));
        entries
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "trace_tests.rs"]
mod tests;
