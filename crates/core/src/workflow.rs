// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`WorkflowTask`] and [`Workflow`]: the abstract task/file DAG a
//! `StandardJob` is lowered from.

use crate::datafile::DataFile;
use crate::ids::{FileId, HostId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    NotReady,
    Ready,
    Pending,
    Running,
    Completed,
    Failed,
}

crate::simple_display! {
    TaskState {
        NotReady => "not_ready",
        Ready => "ready",
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: TaskId,
    pub flops: f64,
    pub min_cores: u32,
    pub max_cores: u32,
    pub ram: u64,
    pub priority: i64,
    pub cluster_id: Option<String>,
    pub failure_count: u32,
    pub state: TaskState,
    pub input_files: Vec<FileId>,
    pub output_files: Vec<FileId>,
    pub parents: Vec<TaskId>,
    pub children: Vec<TaskId>,
    pub start_date: Option<f64>,
    pub end_date: Option<f64>,
    pub execution_host: Option<HostId>,
    /// A stack of callback ports to notify on completion, not just one —
    /// supports a task submitted on behalf of a nested caller (e.g. a
    /// pilot job's child compute service calling back through the job
    /// that spawned it). Mirrors `WorkflowJob`'s `callback_mailbox_stack`
    /// in the original implementation.
    pub callback_port_stack: Vec<String>,
}

impl WorkflowTask {
    pub fn new(flops: f64, min_cores: u32, max_cores: u32, ram: u64, priority: i64) -> Self {
        Self {
            id: TaskId::new(),
            flops,
            min_cores,
            max_cores: max_cores.max(min_cores),
            ram,
            priority,
            cluster_id: None,
            failure_count: 0,
            state: TaskState::NotReady,
            input_files: Vec::new(),
            output_files: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
            start_date: None,
            end_date: None,
            execution_host: None,
            callback_port_stack: Vec::new(),
        }
    }

    pub fn push_callback_port(&mut self, port: impl Into<String>) {
        self.callback_port_stack.push(port.into());
    }

    /// The port the next completion notification should go to, without
    /// consuming it: the top of the stack, or `origin` (the workflow's own
    /// port) if the stack is empty.
    pub fn peek_callback_port(&self, origin: &str) -> String {
        self.callback_port_stack.last().cloned().unwrap_or_else(|| origin.to_string())
    }

    /// Pop and return the next callback port, falling back to `origin`
    /// when the stack is empty (the stack itself is left empty either way).
    pub fn pop_callback_port(&mut self, origin: &str) -> String {
        self.callback_port_stack.pop().unwrap_or_else(|| origin.to_string())
    }
}

/// Tasks indexed by id, files indexed by id, and the task DAG over tasks;
/// the file DAG is induced by producer/consumer relationships rather than
/// stored separately. The `Workflow` exclusively owns its tasks and files
/// (spec.md §3 Lifecycle & ownership).
#[derive(Debug, Default)]
pub struct Workflow {
    tasks: HashMap<TaskId, WorkflowTask>,
    files: HashMap<FileId, DataFile>,
    /// file -> task that produces it, for the induced file DAG.
    producers: HashMap<FileId, TaskId>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, file: DataFile) -> FileId {
        let id = file.id;
        self.files.insert(id, file);
        id
    }

    pub fn add_task(&mut self, task: WorkflowTask) -> TaskId {
        let id = task.id;
        for &output in &task.output_files {
            self.producers.insert(output, id);
        }
        if task.parents.is_empty() {
            self.tasks.insert(id, WorkflowTask { state: TaskState::Ready, ..task });
        } else {
            self.tasks.insert(id, task);
        }
        id
    }

    /// Record `parent -> child`; a task becomes READY iff all parents are
    /// COMPLETED (spec.md §3), so adding a parent after creation always
    /// demotes the child out of READY until this is re-checked.
    pub fn add_dependency(&mut self, parent: TaskId, child: TaskId) {
        if let Some(p) = self.tasks.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.tasks.get_mut(&child) {
            c.parents.push(parent);
            if c.state == TaskState::Ready {
                c.state = TaskState::NotReady;
            }
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&WorkflowTask> {
        self.tasks.get(&id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut WorkflowTask> {
        self.tasks.get_mut(&id)
    }

    pub fn file(&self, id: FileId) -> Option<&DataFile> {
        self.files.get(&id)
    }

    pub fn producer(&self, file: FileId) -> Option<TaskId> {
        self.producers.get(&file).copied()
    }

    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.tasks.values().filter(|t| t.state == TaskState::Ready).map(|t| t.id).collect()
    }

    /// Promote children whose parents are all COMPLETED, mirroring
    /// `CompoundJob::propagate_ready` for the task-level DAG.
    pub fn mark_task_completed(&mut self, id: TaskId, now: f64) {
        if let Some(task) = self.tasks.get_mut(&id) {
            task.state = TaskState::Completed;
            task.end_date = Some(now);
        }
        let children = self.tasks.get(&id).map(|t| t.children.clone()).unwrap_or_default();
        for child_id in children {
            let all_done = self.tasks[&child_id]
                .parents
                .iter()
                .all(|p| self.tasks[p].state == TaskState::Completed);
            if all_done {
                if let Some(child) = self.tasks.get_mut(&child_id) {
                    if child.state == TaskState::NotReady {
                        child.state = TaskState::Ready;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
