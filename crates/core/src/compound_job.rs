// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`CompoundJob`]: a DAG of [`Action`]s submitted as a unit.
//!
//! Actions are stored in an arena keyed by [`ActionId`]; `parents`/
//! `children` on each `Action` hold ids, not owning handles (Design
//! Notes §9), so the graph has no reference cycles even though it
//! describes one.

use crate::action::{Action, ActionState};
use crate::failure::FailureCause;
use crate::ids::{ActionId, CompoundJobId};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CompoundJobState {
    NotSubmitted,
    Submitted,
    Completed,
    Discontinued,
}

#[derive(Debug)]
pub struct CompoundJob {
    pub id: CompoundJobId,
    pub state: CompoundJobState,
    actions: HashMap<ActionId, Action>,
    /// Insertion order, used as the FIFO submission-order scheduling
    /// tiebreak (spec.md §4.5 step 2).
    order: Vec<ActionId>,
}

impl CompoundJob {
    pub fn new() -> Self {
        Self {
            id: CompoundJobId::new(),
            state: CompoundJobState::NotSubmitted,
            actions: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn add_action(&mut self, action: Action) -> ActionId {
        let id = action.id;
        self.order.push(id);
        self.actions.insert(id, action);
        id
    }

    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(&id)
    }

    pub fn action_mut(&mut self, id: ActionId) -> Option<&mut Action> {
        self.actions.get_mut(&id)
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.order.iter().filter_map(|id| self.actions.get(id))
    }

    pub fn submission_index(&self, id: ActionId) -> usize {
        self.order.iter().position(|a| *a == id).unwrap_or(usize::MAX)
    }

    /// Add a `parent -> child` dependency. Rejected (graph left unchanged)
    /// if it would close a cycle or reference an unknown action.
    pub fn add_dependency(&mut self, parent: ActionId, child: ActionId) -> Result<(), FailureCause> {
        if !self.actions.contains_key(&parent) || !self.actions.contains_key(&child) {
            return Err(FailureCause::invalid_argument("unknown action in dependency"));
        }
        if parent == child || self.has_path(child, parent) {
            return Err(FailureCause::invalid_argument(
                "adding this dependency would create a cycle",
            ));
        }
        if let Some(action) = self.actions.get_mut(&parent) {
            action.children.push(child);
        }
        if let Some(action) = self.actions.get_mut(&child) {
            action.parents.push(parent);
        }
        self.recompute_initial_state(child);
        Ok(())
    }

    /// BFS reachability check: is there a path from `from` to `to`?
    fn has_path(&self, from: ActionId, to: ActionId) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(action) = self.actions.get(&current) {
                queue.extend(action.children.iter().copied());
            }
        }
        false
    }

    fn recompute_initial_state(&mut self, id: ActionId) {
        if let Some(action) = self.actions.get_mut(&id) {
            if action.state == ActionState::Ready && !action.parents.is_empty() {
                action.state = ActionState::NotReady;
            }
        }
    }

    /// Actions whose parents have all completed, sorted by (descending
    /// priority, FIFO submission order) per spec.md §4.5 step 2.
    pub fn ready_actions(&self) -> Vec<ActionId> {
        let mut ready: Vec<ActionId> = self
            .actions()
            .filter(|a| a.state == ActionState::Ready)
            .map(|a| a.id)
            .collect();
        ready.sort_by(|a, b| {
            let (pa, pb) = (self.actions[a].priority, self.actions[b].priority);
            pb.cmp(&pa).then_with(|| self.submission_index(*a).cmp(&self.submission_index(*b)))
        });
        ready
    }

    /// Promote every child of `completed` to READY if all of its parents
    /// are now COMPLETED (spec.md §4.6).
    pub fn propagate_ready(&mut self, completed: ActionId) {
        let children = self.actions.get(&completed).map(|a| a.children.clone()).unwrap_or_default();
        for child_id in children {
            let all_parents_completed = self.actions[&child_id]
                .parents
                .iter()
                .all(|p| self.actions[p].state == ActionState::Completed);
            if all_parents_completed {
                if let Some(child) = self.actions.get_mut(&child_id) {
                    if child.state == ActionState::NotReady {
                        child.state = ActionState::Ready;
                    }
                }
            }
        }
    }

    /// An action is terminally blocked iff any parent ended FAILED or
    /// KILLED (spec.md §4.6's canonical rule): it stays NOT_READY forever,
    /// contributing to the job's DISCONTINUED terminal state without ever
    /// itself transitioning.
    pub fn is_blocked(&self, id: ActionId) -> bool {
        self.actions
            .get(&id)
            .map(|a| {
                a.parents.iter().any(|p| {
                    matches!(self.actions[p].state, ActionState::Failed | ActionState::Killed)
                })
            })
            .unwrap_or(false)
    }

    /// Whether every action has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.actions().all(|a| a.state.is_terminal() || self.is_blocked(a.id))
    }

    /// COMPLETED iff every action ended COMPLETED; DISCONTINUED iff at
    /// least one ended FAILED or KILLED (spec.md §3).
    pub fn outcome(&self) -> CompoundJobState {
        if self.actions().all(|a| a.state == ActionState::Completed) {
            CompoundJobState::Completed
        } else {
            CompoundJobState::Discontinued
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for CompoundJob {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "compound_job_tests.rs"]
mod tests;
