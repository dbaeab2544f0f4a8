// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`StandardJob`]: a convenience wrapper lowering a set of
//! [`WorkflowTask`]s plus pre/post file copies and cleanup deletions into
//! a [`CompoundJob`](crate::compound_job::CompoundJob).

use crate::action::{Action, ActionKind};
use crate::compound_job::CompoundJob;
use crate::failure::FailureCause;
use crate::file_location::FileLocation;
use crate::ids::{FileId, StandardJobId};
use crate::workflow::{TaskState, Workflow, WorkflowTask};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StandardJobState {
    NotSubmitted,
    Submitted,
    Completed,
    Failed,
}

/// A file copy to perform before task execution begins (pre) or after it
/// ends (post): `(file, source, destination)`.
#[derive(Debug, Clone)]
pub struct FileCopySpec {
    pub file: FileId,
    pub src: FileLocation,
    pub dst: FileLocation,
}

/// A file to remove from a location regardless of job outcome.
#[derive(Debug, Clone)]
pub struct FileDeleteSpec {
    pub location: FileLocation,
}

#[derive(Debug, Clone)]
pub struct StandardJob {
    pub id: StandardJobId,
    pub task_ids: Vec<crate::ids::TaskId>,
    pub file_locations: HashMap<FileId, FileLocation>,
    pub pre_copies: Vec<FileCopySpec>,
    pub post_copies: Vec<FileCopySpec>,
    pub cleanup_deletions: Vec<FileDeleteSpec>,
    pub num_completed_tasks: u32,
    pub state: StandardJobState,
}

impl StandardJob {
    /// Construct a `StandardJob` from a set of tasks plus staging specs.
    /// All input tasks must be READY (spec.md §3); otherwise rejected
    /// without constructing anything.
    pub fn new(
        workflow: &Workflow,
        task_ids: Vec<crate::ids::TaskId>,
        file_locations: HashMap<FileId, FileLocation>,
        pre_copies: Vec<FileCopySpec>,
        post_copies: Vec<FileCopySpec>,
        cleanup_deletions: Vec<FileDeleteSpec>,
    ) -> Result<Self, FailureCause> {
        if task_ids.is_empty() {
            return Err(FailureCause::invalid_argument("a standard job needs at least one task"));
        }
        for &id in &task_ids {
            let task = workflow
                .task(id)
                .ok_or_else(|| FailureCause::invalid_argument("unknown task in standard job"))?;
            if task.state != TaskState::Ready {
                return Err(FailureCause::invalid_argument(
                    "all tasks used to create a standard job must be READY",
                ));
            }
        }
        Ok(Self {
            id: StandardJobId::new(),
            task_ids,
            file_locations,
            pre_copies,
            post_copies,
            cleanup_deletions,
            num_completed_tasks: 0,
            state: StandardJobState::NotSubmitted,
        })
    }

    pub fn num_tasks(&self) -> usize {
        self.task_ids.len()
    }

    pub fn estimated_flops(&self, workflow: &Workflow) -> f64 {
        self.task_ids.iter().filter_map(|id| workflow.task(*id)).map(|t| t.flops).sum()
    }

    /// Lower this job into the compound-job action DAG spec.md §3
    /// describes: `pre-copy actions -> per-task { input-reads -> compute
    /// -> output-writes } -> post-copy actions -> cleanup-delete
    /// actions`.
    pub fn lower_to_compound_job(&self, workflow: &Workflow) -> CompoundJob {
        self.lower_to_compound_job_with_task_actions(workflow).0
    }

    /// Same lowering as [`Self::lower_to_compound_job`], also returning
    /// which `Action` is each task's compute step — a `JobManager`
    /// submitting this job needs the mapping to translate per-action
    /// outcomes back into `WorkflowTask` state transitions once the
    /// compound job reaches a terminal state.
    pub fn lower_to_compound_job_with_task_actions(
        &self,
        workflow: &Workflow,
    ) -> (CompoundJob, HashMap<crate::ids::TaskId, crate::ids::ActionId>) {
        let mut job = CompoundJob::new();
        let mut task_actions = HashMap::with_capacity(self.task_ids.len());

        let pre_ids: Vec<_> = self
            .pre_copies
            .iter()
            .map(|c| {
                job.add_action(Action::new(
                    ActionKind::FileCopy { src: c.src.clone(), dst: c.dst.clone() },
                    1,
                    1,
                    0,
                    0,
                ))
            })
            .collect();

        let mut task_last_action = Vec::new();
        for &task_id in &self.task_ids {
            let Some(task) = workflow.task(task_id) else { continue };

            let read_ids: Vec<_> = task
                .input_files
                .iter()
                .map(|&f| {
                    let loc = self.file_locations.get(&f).cloned().unwrap_or(FileLocation::scratch(f));
                    let id = job.add_action(Action::new(
                        ActionKind::FileRead { location: loc },
                        1,
                        1,
                        0,
                        task.priority,
                    ));
                    for &pre in &pre_ids {
                        let _ = job.add_dependency(pre, id);
                    }
                    id
                })
                .collect();

            let compute_id = job.add_action(Action::new(
                ActionKind::Compute { flops: task.flops },
                task.min_cores,
                task.max_cores,
                task.ram,
                task.priority,
            ));
            for &r in &read_ids {
                let _ = job.add_dependency(r, compute_id);
            }
            task_actions.insert(task_id, compute_id);

            let write_ids: Vec<_> = task
                .output_files
                .iter()
                .map(|&f| {
                    let loc = self.file_locations.get(&f).cloned().unwrap_or(FileLocation::scratch(f));
                    let id = job.add_action(Action::new(
                        ActionKind::FileWrite { location: loc },
                        1,
                        1,
                        0,
                        task.priority,
                    ));
                    let _ = job.add_dependency(compute_id, id);
                    id
                })
                .collect();

            task_last_action.extend(if write_ids.is_empty() { vec![compute_id] } else { write_ids });
        }

        let post_ids: Vec<_> = self
            .post_copies
            .iter()
            .map(|c| {
                let id = job.add_action(Action::new(
                    ActionKind::FileCopy { src: c.src.clone(), dst: c.dst.clone() },
                    1,
                    1,
                    0,
                    0,
                ));
                for &last in &task_last_action {
                    let _ = job.add_dependency(last, id);
                }
                id
            })
            .collect();

        for d in &self.cleanup_deletions {
            let id = job.add_action(Action::new(
                ActionKind::FileDelete { location: d.location.clone() },
                1,
                1,
                0,
                0,
            ));
            let predecessors = if post_ids.is_empty() { &task_last_action } else { &post_ids };
            for &p in predecessors {
                let _ = job.add_dependency(p, id);
            }
        }

        (job, task_actions)
    }
}

#[cfg(test)]
#[path = "standard_job_tests.rs"]
mod tests;
