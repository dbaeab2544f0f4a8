// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`JobManager`]: per-controller bookkeeping for job submissions
//! (spec.md §4.7). Creates standard/pilot/compound jobs, submits them to
//! a [`BareMetalComputeService`], enforces "a job is submitted at most
//! once", and turns each compute service's terminal reply into a typed
//! [`ExecutionEvent`] on the controller's `CommPort`.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use wrench_core::{
    ActionId, ActionKind, ActionState, CompoundJob, CompoundJobId, CompoundJobState, FailureCause,
    FileCopySpec, FileDeleteSpec, FileId, FileLocation, HostId, PilotJob, PilotJobId,
    RequestedResources, StandardJob, StandardJobId, StandardJobState, TaskId, TaskState, Workflow,
    WrenchResult,
};
use wrench_kernel::{ActorRegistry, CommPort, Platform, SimClock};
use wrench_services::action_executor::CustomActionRegistry;
use wrench_services::bare_metal_compute_service::JobOutcome;
use wrench_services::storage_directory::StorageDirectory;
use wrench_services::{BareMetalComputeService, PilotJobDirectory, PilotJobLifecycleEvent, PilotJobRuntime};

use crate::event::ExecutionEvent;

/// First non-recoverable cause among a lowered standard job's actions,
/// checking reads/copies/deletes *before* computes (spec.md §7's
/// job-level propagation rule).
fn standard_job_failure_cause(job: &CompoundJob) -> Option<FailureCause> {
    let mut compute_fallback = None;
    for action in job.actions() {
        if !matches!(action.state, ActionState::Failed | ActionState::Killed) {
            continue;
        }
        let cause = action.failure_cause.clone().unwrap_or(FailureCause::SomeActionsHaveFailed);
        if matches!(action.kind, ActionKind::Compute { .. }) {
            compute_fallback.get_or_insert(cause);
        } else {
            return Some(cause);
        }
    }
    compute_fallback
}

struct StandardJobEntry {
    standard_job: Mutex<StandardJob>,
    compound_job: Arc<Mutex<CompoundJob>>,
    task_actions: HashMap<TaskId, ActionId>,
}

pub struct JobManager {
    clock: SimClock,
    controller_port: Arc<CommPort<ExecutionEvent>>,
    registry: ActorRegistry,
    workflow: Arc<Mutex<Workflow>>,
    standard_jobs: Mutex<HashMap<StandardJobId, Arc<StandardJobEntry>>>,
    compound_job_ids: Mutex<HashSet<CompoundJobId>>,
    pilot_jobs: PilotJobDirectory,
}

impl JobManager {
    pub fn new(clock: SimClock, controller_port: Arc<CommPort<ExecutionEvent>>, workflow: Arc<Mutex<Workflow>>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            controller_port,
            registry: ActorRegistry::new(),
            workflow,
            standard_jobs: Mutex::new(HashMap::new()),
            compound_job_ids: Mutex::new(HashSet::new()),
            pilot_jobs: PilotJobDirectory::new(),
        })
    }

    pub fn create_standard_job(
        &self,
        task_ids: Vec<TaskId>,
        file_locations: HashMap<FileId, FileLocation>,
        pre_copies: Vec<FileCopySpec>,
        post_copies: Vec<FileCopySpec>,
        cleanup_deletions: Vec<FileDeleteSpec>,
    ) -> WrenchResult<StandardJob> {
        let workflow = self.workflow.lock();
        StandardJob::new(&workflow, task_ids, file_locations, pre_copies, post_copies, cleanup_deletions)
            .map_err(Into::into)
    }

    pub fn create_pilot_job(&self, requested_resources: RequestedResources, expiration_secs: Option<f64>) -> PilotJob {
        PilotJob::new(requested_resources, expiration_secs)
    }

    pub fn create_compound_job(&self) -> Arc<Mutex<CompoundJob>> {
        Arc::new(Mutex::new(CompoundJob::new()))
    }

    /// Lower `job` to a compound job and submit it, marking every task it
    /// covers `PENDING` immediately. The watcher that turns the eventual
    /// `JobOutcome` into a `StandardJobCompleted`/`StandardJobFailed`
    /// event runs as a background actor on this manager's registry.
    pub fn submit_standard_job(
        self: &Arc<Self>,
        mut job: StandardJob,
        compute_service: Arc<BareMetalComputeService>,
        args: HashMap<ActionId, String>,
    ) -> WrenchResult<StandardJobId> {
        if job.state != StandardJobState::NotSubmitted {
            return Err(FailureCause::invalid_argument("standard job already submitted").into());
        }

        let (compound, task_actions) = {
            let workflow = self.workflow.lock();
            job.lower_to_compound_job_with_task_actions(&workflow)
        };
        let job_id = job.id;
        let compound_job_id = compound.id;
        let compound = Arc::new(Mutex::new(compound));
        job.state = StandardJobState::Submitted;

        {
            let mut workflow = self.workflow.lock();
            for &task_id in &job.task_ids {
                if let Some(task) = workflow.task_mut(task_id) {
                    task.state = TaskState::Pending;
                }
            }
        }

        let answer = Arc::new(CommPort::named(format!("jm-standard-{compound_job_id}"), self.clock.clone()));
        compute_service.submit_job(Arc::clone(&compound), args, Arc::clone(&answer))?;

        let entry = Arc::new(StandardJobEntry { standard_job: Mutex::new(job), compound_job: compound, task_actions });
        self.standard_jobs.lock().insert(job_id, Arc::clone(&entry));

        let manager = Arc::clone(self);
        self.registry.spawn(move |_kill_switch| async move {
            if let Ok(outcome) = answer.get().await {
                manager.on_standard_job_outcome(job_id, outcome);
            }
        });

        Ok(job_id)
    }

    fn on_standard_job_outcome(&self, job_id: StandardJobId, outcome: JobOutcome) {
        let Some(entry) = self.standard_jobs.lock().get(&job_id).cloned() else { return };

        let (num_completed, per_task, cause) = {
            let compound = entry.compound_job.lock();
            let mut num_completed = 0u32;
            let mut per_task = Vec::with_capacity(entry.task_actions.len());
            for (&task_id, &action_id) in &entry.task_actions {
                if let Some(action) = compound.action(action_id) {
                    if action.state == ActionState::Completed {
                        num_completed += 1;
                    }
                    per_task.push((task_id, action.state, action.start_date, action.end_date));
                }
            }
            (num_completed, per_task, standard_job_failure_cause(&compound))
        };

        {
            let mut workflow = self.workflow.lock();
            for (task_id, state, start_date, end_date) in per_task {
                if let Some(task) = workflow.task_mut(task_id) {
                    task.start_date = start_date;
                }
                match state {
                    ActionState::Completed => {
                        workflow.mark_task_completed(task_id, end_date.unwrap_or_else(|| self.clock.now()));
                    }
                    _ => {
                        if let Some(task) = workflow.task_mut(task_id) {
                            task.state = TaskState::Failed;
                            task.end_date = end_date;
                            task.failure_count += 1;
                        }
                    }
                }
            }
        }

        {
            let mut standard_job = entry.standard_job.lock();
            standard_job.num_completed_tasks = num_completed;
            standard_job.state = match outcome.state {
                CompoundJobState::Completed => StandardJobState::Completed,
                _ => StandardJobState::Failed,
            };
        }

        let event = match outcome.state {
            CompoundJobState::Completed => {
                ExecutionEvent::StandardJobCompleted { job: job_id, compute_service: outcome.service }
            }
            _ => ExecutionEvent::StandardJobFailed {
                job: job_id,
                compute_service: outcome.service,
                failure_cause: cause.unwrap_or(FailureCause::SomeActionsHaveFailed),
            },
        };
        let _ = self.controller_port.put(event);
    }

    pub fn submit_compound_job(
        self: &Arc<Self>,
        job: Arc<Mutex<CompoundJob>>,
        compute_service: Arc<BareMetalComputeService>,
        args: HashMap<ActionId, String>,
    ) -> WrenchResult<CompoundJobId> {
        let job_id = {
            let guard = job.lock();
            if guard.state != CompoundJobState::NotSubmitted {
                return Err(FailureCause::invalid_argument("compound job already submitted").into());
            }
            guard.id
        };
        if !self.compound_job_ids.lock().insert(job_id) {
            return Err(FailureCause::invalid_argument("compound job already submitted").into());
        }

        let answer = Arc::new(CommPort::named(format!("jm-compound-{job_id}"), self.clock.clone()));
        compute_service.submit_job(Arc::clone(&job), args, Arc::clone(&answer))?;

        let controller_port = Arc::clone(&self.controller_port);
        self.registry.spawn(move |_kill_switch| async move {
            if let Ok(outcome) = answer.get().await {
                let event = match outcome.state {
                    CompoundJobState::Completed => {
                        ExecutionEvent::CompoundJobCompleted { job: job_id, compute_service: outcome.service }
                    }
                    _ => ExecutionEvent::CompoundJobFailed {
                        job: job_id,
                        compute_service: outcome.service,
                        failure_cause: outcome.failure_cause.unwrap_or(FailureCause::SomeActionsHaveFailed),
                    },
                };
                let _ = controller_port.put(event);
            }
        });

        Ok(job_id)
    }

    /// Grant a pilot job its resources and start its child compute
    /// service, forwarding `PilotJobStarted`/`PilotJobExpired` to the
    /// controller as they happen.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_pilot_job(
        self: &Arc<Self>,
        job: PilotJob,
        hosts: Vec<HostId>,
        platform: Arc<Platform>,
        storage: Arc<StorageDirectory>,
        custom_actions: Arc<CustomActionRegistry>,
    ) -> WrenchResult<PilotJobRuntime> {
        let controller_port = Arc::clone(&self.controller_port);
        let on_event: Arc<dyn Fn(PilotJobLifecycleEvent) + Send + Sync> = Arc::new(move |event| {
            let event = match event {
                PilotJobLifecycleEvent::Started { pilot_job, compute_service } => {
                    ExecutionEvent::PilotJobStarted { pilot_job, compute_service }
                }
                PilotJobLifecycleEvent::Expired { pilot_job } => ExecutionEvent::PilotJobExpired { pilot_job },
            };
            let _ = controller_port.put(event);
        });

        let runtime =
            PilotJobRuntime::start(job, hosts, platform, self.clock.clone(), &self.registry, storage, custom_actions, on_event)?;
        self.pilot_jobs.insert(runtime.clone());
        Ok(runtime)
    }

    pub fn terminate_compound_job(&self, job_id: CompoundJobId, compute_service: &Arc<BareMetalComputeService>) -> WrenchResult<()> {
        compute_service.terminate_job(job_id)
    }

    pub fn terminate_standard_job(&self, job_id: StandardJobId, compute_service: &Arc<BareMetalComputeService>) -> WrenchResult<()> {
        let Some(entry) = self.standard_jobs.lock().get(&job_id).cloned() else {
            return Err(FailureCause::invalid_argument("no such standard job on this manager").into());
        };
        let compound_id = entry.compound_job.lock().id;
        compute_service.terminate_job(compound_id)
    }

    pub fn terminate_pilot_job(&self, pilot_job: PilotJobId) -> WrenchResult<()> {
        let Some(runtime) = self.pilot_jobs.get(pilot_job) else {
            return Err(FailureCause::invalid_argument("no such pilot job on this manager").into());
        };
        runtime.terminate();
        Ok(())
    }

    pub fn standard_job_state(&self, job_id: StandardJobId) -> Option<StandardJobState> {
        self.standard_jobs.lock().get(&job_id).map(|entry| entry.standard_job.lock().state)
    }

    pub fn standard_job_num_completed_tasks(&self, job_id: StandardJobId) -> Option<u32> {
        self.standard_jobs.lock().get(&job_id).map(|entry| entry.standard_job.lock().num_completed_tasks)
    }
}

#[cfg(test)]
#[path = "job_manager_tests.rs"]
mod tests;
