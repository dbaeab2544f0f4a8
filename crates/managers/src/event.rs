// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`ExecutionEvent`]: the tagged sum landing on a controller's
//! `CommPort` (spec.md §6) — everything a `JobManager` or
//! `DataMovementManager` reports back once a job, copy, or pilot-job
//! reservation reaches a state worth telling the controller about.
//!
//! Serializes `{"type": "standard_job:completed", ...}` the same way
//! `oj-core::event::Event` tags its variants, for any controller that
//! wants to log or replay a run's event stream rather than just match on
//! it in-process.

use serde::{Deserialize, Serialize};
use wrench_core::{CompoundJobId, FailureCause, FileId, PilotJobId, ServiceId, StandardJobId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    #[serde(rename = "standard_job:completed")]
    StandardJobCompleted { job: StandardJobId, compute_service: ServiceId },

    #[serde(rename = "standard_job:failed")]
    StandardJobFailed { job: StandardJobId, compute_service: ServiceId, failure_cause: FailureCause },

    #[serde(rename = "compound_job:completed")]
    CompoundJobCompleted { job: CompoundJobId, compute_service: ServiceId },

    #[serde(rename = "compound_job:failed")]
    CompoundJobFailed { job: CompoundJobId, compute_service: ServiceId, failure_cause: FailureCause },

    #[serde(rename = "pilot_job:started")]
    PilotJobStarted { pilot_job: PilotJobId, compute_service: ServiceId },

    #[serde(rename = "pilot_job:expired")]
    PilotJobExpired { pilot_job: PilotJobId },

    #[serde(rename = "file_copy:completed")]
    FileCopyCompleted { file: FileId, src: ServiceId, dst: ServiceId },

    #[serde(rename = "file_copy:failed")]
    FileCopyFailed { file: FileId, src: ServiceId, dst: ServiceId, failure_cause: FailureCause },

    /// Fired by an `ExecutionController`'s own timer, not by a manager —
    /// carried here anyway since it shares the controller's event channel
    /// and tagged-sum shape (spec.md §6).
    #[serde(rename = "timer:fired")]
    TimerGoesOff { name: String },
}

impl ExecutionEvent {
    /// A short tag for logging, mirroring how `oj-core::event::Event`
    /// implementations name themselves in trace spans.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionEvent::StandardJobCompleted { .. } => "standard_job:completed",
            ExecutionEvent::StandardJobFailed { .. } => "standard_job:failed",
            ExecutionEvent::CompoundJobCompleted { .. } => "compound_job:completed",
            ExecutionEvent::CompoundJobFailed { .. } => "compound_job:failed",
            ExecutionEvent::PilotJobStarted { .. } => "pilot_job:started",
            ExecutionEvent::PilotJobExpired { .. } => "pilot_job:expired",
            ExecutionEvent::FileCopyCompleted { .. } => "file_copy:completed",
            ExecutionEvent::FileCopyFailed { .. } => "file_copy:failed",
            ExecutionEvent::TimerGoesOff { .. } => "timer:fired",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
