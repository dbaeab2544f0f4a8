// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`PilotJobRuntime`]: once a [`PilotJob`](wrench_core::PilotJob) is
//! granted, this owns the dynamically created
//! [`BareMetalComputeService`] scoped to its slice of resources
//! (spec.md §4.5.1) — the rewrite's generalization of the original's
//! standalone/multicore executor split (Design Notes §9: the multicore
//! executor is "a thin adapter... do not duplicate scheduling logic").
//! The child service *is* a `BareMetalComputeService`; this module only
//! adds the grant/expiration lifecycle around it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use wrench_core::{
    FailureCause, HostId, PilotJob, PilotJobId, PilotJobState, PropertyMap, RequestedResources,
    ServiceId, WrenchResult,
};
use wrench_kernel::{ActorHandle, ActorRegistry, Platform, SimClock};

use crate::action_executor::CustomActionRegistry;
use crate::bare_metal_compute_service::BareMetalComputeService;
use crate::storage_directory::StorageDirectory;
use crate::storage_service::StorageService;

/// Reported once the pilot job's reservation is granted and its child
/// compute service is up, or once it expires/is terminated
/// (spec.md §4.7's `PilotJobStartedEvent`/`PilotJobExpiredEvent`).
#[derive(Debug, Clone)]
pub enum PilotJobLifecycleEvent {
    Started { pilot_job: PilotJobId, compute_service: ServiceId },
    Expired { pilot_job: PilotJobId },
}

struct Runtime {
    job: PilotJob,
    child: Arc<BareMetalComputeService>,
    expiration_actor: Option<ActorHandle>,
}

/// Owns one granted pilot job's reservation and child compute service.
/// `start` is the only way to produce one — a `PilotJob` only gets a
/// runtime once it is actually granted resources.
#[derive(Clone)]
pub struct PilotJobRuntime {
    runtime: Arc<Mutex<Runtime>>,
}

impl PilotJobRuntime {
    /// Grant `job`'s `requested_resources` over `hosts` (one slot per
    /// host, cores/ram identical across hosts per spec.md §3's
    /// `RequestedResources`), spin up its child compute service, and —
    /// if an expiration is set — arm the actor that tears it down when
    /// the clock reaches it.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        mut job: PilotJob,
        hosts: Vec<HostId>,
        platform: Arc<Platform>,
        clock: SimClock,
        registry: &ActorRegistry,
        storage: Arc<StorageDirectory>,
        custom_actions: Arc<CustomActionRegistry>,
        on_event: Arc<dyn Fn(PilotJobLifecycleEvent) + Send + Sync>,
    ) -> WrenchResult<Self> {
        let RequestedResources { num_hosts, cores_per_host, ram_per_host } = job.requested_resources;
        if hosts.len() != num_hosts as usize {
            return Err(FailureCause::invalid_argument(format!(
                "pilot job requested {num_hosts} hosts but was granted {}",
                hosts.len()
            ))
            .into());
        }
        let resources: Vec<(HostId, u32, u64)> =
            hosts.iter().map(|h| (*h, cores_per_host, ram_per_host)).collect();

        let child = BareMetalComputeService::new(
            Arc::clone(&platform),
            clock.clone(),
            resources,
            PropertyMap::empty(),
            storage,
            None,
            custom_actions,
        )?;
        child.start();

        job.state = PilotJobState::Started;
        job.child_compute_service = Some(child.id());
        let pilot_job_id = job.id;
        let child_service_id = child.id();

        let runtime = Arc::new(Mutex::new(Runtime { job, child: Arc::clone(&child), expiration_actor: None }));

        on_event(PilotJobLifecycleEvent::Started { pilot_job: pilot_job_id, compute_service: child_service_id });

        if let Some(expiration_secs) = runtime.lock().job.expiration_secs {
            let runtime_for_actor = Arc::clone(&runtime);
            let on_event = Arc::clone(&on_event);
            let clock_for_actor = clock.clone();
            let actor = registry.spawn(move |mut kill_switch| async move {
                tokio::select! {
                    biased;
                    () = kill_switch.killed() => {}
                    () = clock_for_actor.sleep_for(expiration_secs) => {
                        PilotJobRuntime { runtime: runtime_for_actor }.expire(&on_event);
                    }
                }
            });
            runtime.lock().expiration_actor = Some(actor);
        }

        Ok(Self { runtime })
    }

    pub fn id(&self) -> PilotJobId {
        self.runtime.lock().job.id
    }

    pub fn child_compute_service(&self) -> Arc<BareMetalComputeService> {
        Arc::clone(&self.runtime.lock().child)
    }

    pub fn state(&self) -> PilotJobState {
        self.runtime.lock().job.state
    }

    /// Explicit termination (before expiration, if any): stop the child
    /// service, discontinuing every job still running on it, the same
    /// way `terminateJob` would for each.
    pub fn terminate(&self) {
        let mut runtime = self.runtime.lock();
        if runtime.job.state != PilotJobState::Started {
            return;
        }
        runtime.child.terminate_all_jobs();
        runtime.child.stop();
        runtime.job.state = PilotJobState::Expired;
        if let Some(actor) = runtime.expiration_actor.take() {
            actor.kill();
        }
    }

    fn expire(&self, on_event: &Arc<dyn Fn(PilotJobLifecycleEvent) + Send + Sync>) {
        let pilot_job_id = {
            let mut runtime = self.runtime.lock();
            if runtime.job.state != PilotJobState::Started {
                return;
            }
            runtime.child.terminate_all_jobs();
            runtime.child.stop();
            runtime.job.state = PilotJobState::Expired;
            runtime.job.id
        };
        on_event(PilotJobLifecycleEvent::Expired { pilot_job: pilot_job_id });
    }
}

/// Tracks every granted pilot job by id, for a `JobManager`'s bookkeeping.
#[derive(Default)]
pub struct PilotJobDirectory {
    runtimes: Mutex<HashMap<PilotJobId, PilotJobRuntime>>,
}

impl PilotJobDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, runtime: PilotJobRuntime) {
        self.runtimes.lock().insert(runtime.id(), runtime);
    }

    pub fn get(&self, id: PilotJobId) -> Option<PilotJobRuntime> {
        self.runtimes.lock().get(&id).cloned()
    }
}

#[cfg(test)]
#[path = "pilot_tests.rs"]
mod tests;
