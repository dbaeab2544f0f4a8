// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`BareMetalComputeService`]: accepts compound jobs and schedules their
//! actions across a fixed pool of `(host, cores, ram)` slots (spec.md
//! §4.5). The scheduling loop itself runs synchronously whenever
//! something might have changed (a job was submitted, an executor
//! finished, a host came back up) rather than as its own polling actor —
//! only the executor-completion callback needs a background actor, since
//! that is the one event this service cannot observe synchronously.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use wrench_core::{
    Action, ActionId, ActionState, CompoundJob, CompoundJobId, CompoundJobState, FailureCause,
    FileLocation, HostId, PropertyKind, PropertyMap, PropertySchema, ServiceId, WrenchResult,
};
use wrench_kernel::{ActorHandle, ActorRegistry, CommPort, Platform, SimClock};

use crate::action_executor::{
    self, ActionExecutorDone, ActionExecutorHandle, ActionExecutorParams, CustomActionRegistry, ExecutionContext,
};
use crate::service::ServiceHandle;
use crate::storage_directory::StorageDirectory;
use crate::storage_service::StorageService;

pub fn property_schema() -> PropertySchema {
    PropertySchema::new(&[
        ("task_startup_overhead", PropertyKind::NonNegativeFloat),
        ("fail_action_after_action_executor_crash", PropertyKind::Bool),
        ("ttl", PropertyKind::NonNegativeFloat),
        ("simulate_compute_as_sleep", PropertyKind::Bool),
        ("executor_callback_payload_bytes", PropertyKind::NonNegativeInt),
    ])
}

/// The kind of job a compute service is asked to run — generalized from
/// the original's `WorkflowJob::Type` switch (spec.md §1.2) since compound
/// jobs are first-class here alongside the standard/pilot wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Standard,
    Compound,
    Pilot,
}

/// `submitJob`'s per-action placement hint (spec.md §4.5): `"host[:cores]"`
/// pins a host (optionally with a core count), a bare number requests a
/// core count without pinning a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementHint {
    Host { host: HostId, cores: Option<u32> },
    Cores(u32),
}

fn parse_placement_hint(hosts: &[HostId], raw: &str) -> Result<PlacementHint, FailureCause> {
    if let Some((host_part, cores_part)) = raw.split_once(':') {
        let host = hosts.iter().copied().find(|h| h.as_str() == host_part).ok_or_else(|| {
            FailureCause::invalid_argument(format!("placement hint references unknown host '{host_part}'"))
        })?;
        let cores: u32 = cores_part.parse().map_err(|_| {
            FailureCause::invalid_argument(format!("placement hint has a non-numeric core count '{cores_part}'"))
        })?;
        return Ok(PlacementHint::Host { host, cores: Some(cores) });
    }
    if let Ok(cores) = raw.parse::<u32>() {
        return Ok(PlacementHint::Cores(cores));
    }
    let host = hosts
        .iter()
        .copied()
        .find(|h| h.as_str() == raw)
        .ok_or_else(|| FailureCause::invalid_argument(format!("placement hint references unknown host '{raw}'")))?;
    Ok(PlacementHint::Host { host, cores: None })
}

/// Reported to a job's submitter once it reaches a terminal state
/// (spec.md §4.7's `CompoundJobCompletedEvent`/`CompoundJobFailedEvent`,
/// generalized here to one message type with the outcome inline).
pub struct JobOutcome {
    pub job: CompoundJobId,
    pub service: ServiceId,
    pub state: CompoundJobState,
    pub failure_cause: Option<FailureCause>,
}

struct JobEntry {
    job: Arc<Mutex<CompoundJob>>,
    args: HashMap<ActionId, PlacementHint>,
    answer_port: Arc<CommPort<JobOutcome>>,
    submission_seq: u64,
    notified: bool,
}

struct RunningExecutor {
    handle: ActionExecutorHandle,
    job_id: CompoundJobId,
    action_id: ActionId,
    host: HostId,
    cores: u32,
    ram: u64,
}

struct Runtime {
    /// Used (cores, ram) per host; capacity is `resources`.
    used: HashMap<HostId, (u32, u64)>,
    jobs: HashMap<CompoundJobId, JobEntry>,
    executors: HashMap<wrench_core::ExecutorId, RunningExecutor>,
    /// Actions that have been handed to an executor but whose completion
    /// hasn't been processed yet — excluded from `ready_actions()` so the
    /// scheduling loop never double-places one (spec.md §4.5 step 5's
    /// "park" is otherwise ambiguous about already-running actions).
    in_flight: HashSet<ActionId>,
    next_job_seq: u64,
}

pub struct BareMetalComputeService {
    handle: ServiceHandle,
    platform: Arc<Platform>,
    clock: SimClock,
    properties: PropertyMap,
    /// `resources[0].0`, kept as its own field (rather than re-derived each
    /// time) since it doubles as this service's identity for billing an
    /// executor's callback back to it (spec.md §4.1's `payload_map`).
    primary_host: HostId,
    resources: Vec<(HostId, u32, u64)>,
    runtime: Mutex<Runtime>,
    registry: ActorRegistry,
    storage: Arc<StorageDirectory>,
    scratch: Option<Arc<StorageService>>,
    custom_actions: Arc<CustomActionRegistry>,
    callback_port: Arc<CommPort<ActionExecutorDone>>,
    supported_kinds: HashSet<JobKind>,
    loop_handle: Mutex<Option<ActorHandle>>,
}

impl BareMetalComputeService {
    /// Constructor validation per spec.md §4.5: rejects an empty resource
    /// list, an unknown host, zero cores, cores exceeding the host's
    /// total, or RAM exceeding the host's total.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<Platform>,
        clock: SimClock,
        resources: Vec<(HostId, u32, u64)>,
        properties: PropertyMap,
        storage: Arc<StorageDirectory>,
        scratch: Option<Arc<StorageService>>,
        custom_actions: Arc<CustomActionRegistry>,
    ) -> WrenchResult<Arc<Self>> {
        if resources.is_empty() {
            return Err(FailureCause::invalid_argument("a compute service needs at least one (host, cores, ram) slot").into());
        }
        for (host, cores, ram) in &resources {
            let host_cores = platform
                .host_cores(*host)
                .ok_or_else(|| FailureCause::invalid_argument(format!("unknown host '{host}'")))?;
            let host_ram = platform.host_ram(*host).unwrap_or(0);
            if *cores == 0 {
                return Err(FailureCause::invalid_argument(format!("host '{host}' was given zero cores")).into());
            }
            if *cores > host_cores {
                return Err(FailureCause::invalid_argument(format!(
                    "host '{host}' was given {cores} cores but only has {host_cores}"
                ))
                .into());
            }
            if *ram > host_ram {
                return Err(FailureCause::invalid_argument(format!(
                    "host '{host}' was given {ram} bytes of RAM but only has {host_ram}"
                ))
                .into());
            }
        }

        let used = resources.iter().map(|(h, _, _)| (*h, (0u32, 0u64))).collect();
        let primary_host = resources[0].0;

        Ok(Arc::new(Self {
            handle: ServiceHandle::new(primary_host),
            platform,
            clock: clock.clone(),
            properties,
            primary_host,
            resources,
            runtime: Mutex::new(Runtime {
                used,
                jobs: HashMap::new(),
                executors: HashMap::new(),
                in_flight: HashSet::new(),
                next_job_seq: 0,
            }),
            registry: ActorRegistry::new(),
            storage,
            scratch,
            custom_actions,
            callback_port: Arc::new(CommPort::named("bare-metal-callback", clock)),
            supported_kinds: HashSet::from([JobKind::Standard, JobKind::Compound]),
            loop_handle: Mutex::new(None),
        }))
    }

    pub fn id(&self) -> ServiceId {
        self.handle.id()
    }

    pub fn handle(&self) -> &ServiceHandle {
        &self.handle
    }

    /// Start the background actor that drains completed executors. Must
    /// be called once the service is wrapped in its final `Arc` (the loop
    /// body needs to share it).
    pub fn start(self: &Arc<Self>) {
        tracing::info!(service = %self.handle.id(), primary_host = %self.primary_host, "compute service starting");
        let service = Arc::clone(self);
        let handle = self.registry.spawn(move |mut kill_switch| async move {
            loop {
                tokio::select! {
                    biased;
                    () = kill_switch.killed() => break,
                    done = service.callback_port.get() => {
                        match done {
                            Ok(done) => service.on_executor_done(done),
                            Err(_) => break,
                        }
                    }
                }
            }
        });
        *self.loop_handle.lock() = Some(handle);
    }

    /// Shut the service down permanently. Unlike `terminateJob`, this is
    /// not surgical: the service's own completion-processing actor dies
    /// with it, so every action still STARTED at this instant is finalized
    /// right here rather than through the normal executor-done callback,
    /// and each affected job's terminal outcome is still reported to its
    /// submitter (spec.md §8 scenario 4 — a service going down, unlike a
    /// caller-initiated `terminateJob`, is not something the submitter
    /// already knows about).
    pub fn stop(self: &Arc<Self>) {
        tracing::info!(service = %self.handle.id(), "compute service stopping");
        self.handle.stop();
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.kill();
        }

        let mut runtime = self.runtime.lock();
        let now = self.clock.now();

        let affected_jobs: HashSet<CompoundJobId> = runtime.executors.values().map(|e| e.job_id).collect();
        for executor in runtime.executors.values() {
            executor.handle.kill();
        }
        runtime.executors.clear();
        runtime.in_flight.clear();
        runtime.used.clear();

        for &job_id in &affected_jobs {
            if let Some(entry) = runtime.jobs.get(&job_id) {
                let job = Arc::clone(&entry.job);
                let mut guard = job.lock();
                let running: Vec<ActionId> =
                    guard.actions().filter(|a| a.state == ActionState::Started).map(|a| a.id).collect();
                for action_id in running {
                    if let Some(action) = guard.action_mut(action_id) {
                        action.finish_attempt(
                            now,
                            ActionState::Killed,
                            Some(FailureCause::JobKilled { action: Some(action_id) }),
                        );
                    }
                }
            }
        }
        for &job_id in &affected_jobs {
            self.maybe_notify_terminal(&mut runtime, job_id);
        }
    }

    fn resources_hosts(&self) -> Vec<HostId> {
        self.resources.iter().map(|(h, _, _)| *h).collect()
    }

    fn host_capacity(&self, host: HostId) -> Option<(u32, u64)> {
        self.resources.iter().find(|(h, _, _)| *h == host).map(|(_, c, r)| (*c, *r))
    }

    /// `submitJob`: validates the job can ever fit, registers it, and
    /// immediately attempts to place its ready actions.
    pub fn submit_job(
        self: &Arc<Self>,
        job: Arc<Mutex<CompoundJob>>,
        args: HashMap<ActionId, String>,
        answer_port: Arc<CommPort<JobOutcome>>,
    ) -> WrenchResult<CompoundJobId> {
        self.handle.require_up()?;

        let hosts = self.resources_hosts();
        let mut hints = HashMap::with_capacity(args.len());
        for (action_id, raw) in args {
            hints.insert(action_id, parse_placement_hint(&hosts, &raw)?);
        }

        let job_id = {
            let guard = job.lock();
            if guard.is_empty() {
                return Err(FailureCause::invalid_argument("job has no actions").into());
            }
            for action in guard.actions() {
                if !self.resources.iter().any(|(_, cores, ram)| *cores >= action.min_cores && *ram >= action.ram_footprint) {
                    return Err(FailureCause::NotEnoughResources { job: guard.id, service: self.handle.id() }.into());
                }
            }
            guard.id
        };

        {
            let mut guard = job.lock();
            guard.state = CompoundJobState::Submitted;
        }

        let mut runtime = self.runtime.lock();
        let seq = runtime.next_job_seq;
        runtime.next_job_seq += 1;
        runtime.jobs.insert(job_id, JobEntry { job, args: hints, answer_port, submission_seq: seq, notified: false });
        drop(runtime);

        tracing::debug!(service = %self.handle.id(), job = %job_id, "job submitted");
        self.schedule();
        Ok(job_id)
    }

    /// `terminateJob`: kills every running executor of the job, force-kills
    /// any not-yet-started ready action, and marks the job discontinued.
    ///
    /// Termination is synchronous from the caller's point of view (spec.md
    /// §8 scenario 5): the job's owner already knows it ended the job
    /// itself, so unlike a job that runs to its own natural terminal
    /// state, a terminated job never reports a `CompoundJobCompletedEvent`/
    /// `CompoundJobFailedEvent` back through the answer port — the entry
    /// is marked notified up front so the executor-completion callbacks
    /// that follow (as killed executors actually exit) stay silent.
    pub fn terminate_job(self: &Arc<Self>, job_id: CompoundJobId) -> WrenchResult<()> {
        let mut runtime = self.runtime.lock();
        let Some(entry) = runtime.jobs.get_mut(&job_id) else {
            return Err(FailureCause::invalid_argument("no such job on this service").into());
        };
        tracing::info!(service = %self.handle.id(), job = %job_id, "job terminated by caller");
        let job = Arc::clone(&entry.job);
        entry.notified = true;

        for executor in runtime.executors.values() {
            if executor.job_id == job_id {
                executor.handle.kill();
            }
        }

        {
            let mut guard = job.lock();
            let ready: Vec<ActionId> = guard.actions().filter(|a| a.state == ActionState::Ready).map(|a| a.id).collect();
            for action_id in ready {
                if runtime.in_flight.contains(&action_id) {
                    continue;
                }
                if let Some(action) = guard.action_mut(action_id) {
                    action.state = ActionState::Killed;
                    action.failure_cause = Some(FailureCause::JobKilled { action: Some(action_id) });
                }
            }
            guard.state = CompoundJobState::Discontinued;
        }

        drop(runtime);
        self.schedule();
        Ok(())
    }

    /// Terminate every job still submitted to this service, each the same
    /// way `terminate_job` would. Used when a pilot job's reservation
    /// expires out from under a child compute service that still has work
    /// running on it.
    pub fn terminate_all_jobs(self: &Arc<Self>) {
        let job_ids: Vec<CompoundJobId> = self.runtime.lock().jobs.keys().copied().collect();
        for job_id in job_ids {
            let _ = self.terminate_job(job_id);
        }
    }

    /// Host-crash fault injection: every executor running on `host` fails
    /// its action with `HostError`. The service itself stays up.
    pub fn on_host_crash(&self, host: HostId) {
        let runtime = self.runtime.lock();
        let affected = runtime.executors.values().filter(|e| e.host == host).count();
        if affected > 0 {
            tracing::warn!(service = %self.handle.id(), host = %host, affected_executors = affected, "host crashed under running executors");
        }
        for executor in runtime.executors.values() {
            if executor.host == host {
                executor.handle.fail_due_to_host_crash();
            }
        }
    }

    /// A host this service has resources on just came back up (spec.md
    /// §4.5 step 5: "re-enter the loop whenever resources change ...
    /// host turns on"). Parked actions never get another look on their
    /// own once a host goes down, since nothing else re-drives the
    /// scheduling loop for them.
    pub fn on_host_restart(self: &Arc<Self>, host: HostId) {
        tracing::info!(service = %self.handle.id(), host = %host, "host restarted, re-driving scheduling loop");
        self.schedule();
    }

    fn on_executor_done(self: &Arc<Self>, done: ActionExecutorDone) {
        tracing::debug!(service = %self.handle.id(), job = %done.job, action = %done.action, executor = %done.executor_id, "executor reported done");
        let mut runtime = self.runtime.lock();
        runtime.in_flight.remove(&done.action);
        if let Some(running) = runtime.executors.remove(&done.executor_id) {
            if let Some((used_cores, used_ram)) = runtime.used.get_mut(&running.host) {
                *used_cores = used_cores.saturating_sub(running.cores);
                *used_ram = used_ram.saturating_sub(running.ram);
            }
        }

        let retry_candidate = runtime.jobs.get(&done.job).map(|e| {
            let job = e.job.lock();
            job.action(done.action).map(|a| (a.state, a.failure_cause.clone()))
        });

        if let Some(Some((ActionState::Failed, Some(cause)))) = retry_candidate {
            let allow_retry = cause.is_executor_crash()
                && !self.properties.get_bool("fail_action_after_action_executor_crash", false);
            if allow_retry {
                tracing::info!(service = %self.handle.id(), job = %done.job, action = %done.action, "retrying action after executor crash");
                if let Some(entry) = runtime.jobs.get(&done.job) {
                    let mut job = entry.job.lock();
                    if let Some(action) = job.action_mut(done.action) {
                        action.retry();
                    }
                }
            }
        }

        self.maybe_notify_terminal(&mut runtime, done.job);
        drop(runtime);
        self.schedule();
    }

    fn maybe_notify_terminal(&self, runtime: &mut Runtime, job_id: CompoundJobId) {
        let Some(entry) = runtime.jobs.get_mut(&job_id) else { return };
        if entry.notified {
            return;
        }
        let (is_terminal, outcome) = {
            let mut job = entry.job.lock();
            let is_terminal = job.is_terminal();
            let outcome = job.outcome();
            if is_terminal {
                job.state = outcome;
            }
            (is_terminal, outcome)
        };
        if !is_terminal {
            return;
        }
        entry.notified = true;
        let failure_cause = match outcome {
            CompoundJobState::Completed => None,
            _ => Some(FailureCause::SomeActionsHaveFailed),
        };
        tracing::info!(service = %self.handle.id(), job = %job_id, outcome = ?outcome, "job reached terminal state");
        let _ = entry.answer_port.put(JobOutcome {
            job: job_id,
            service: self.handle.id(),
            state: outcome,
            failure_cause,
        });
    }

    /// The scheduling loop (spec.md §4.5): gather ready actions across all
    /// submitted jobs, sort by (descending priority, submission order),
    /// and place as many as currently fit.
    fn schedule(self: &Arc<Self>) {
        let mut runtime = self.runtime.lock();
        let job_ids: Vec<CompoundJobId> = runtime.jobs.keys().copied().collect();

        let mut candidates: Vec<(i64, u64, usize, CompoundJobId, ActionId)> = Vec::new();
        for job_id in &job_ids {
            let entry = &runtime.jobs[job_id];
            let job = entry.job.lock();
            for action_id in job.ready_actions() {
                if runtime.in_flight.contains(&action_id) {
                    continue;
                }
                let Some(action) = job.action(action_id) else { continue };
                candidates.push((action.priority, entry.submission_seq, job.submission_index(action_id), *job_id, action_id));
            }
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)).then_with(|| a.2.cmp(&b.2)));

        for (_, _, _, job_id, action_id) in candidates {
            let hint = runtime.jobs.get(&job_id).and_then(|e| e.args.get(&action_id)).copied();
            let job = Arc::clone(&runtime.jobs[&job_id].job);

            let Some((min_cores, max_cores, ram_footprint)) = ({
                let guard = job.lock();
                guard.action(action_id).map(|action| (action.min_cores, action.max_cores, action.ram_footprint))
            }) else {
                continue;
            };

            let placement = self.choose_placement(&runtime, hint, min_cores, max_cores, ram_footprint);
            let Some((host, cores)) = placement else {
                continue;
            };

            let Some((used_cores, used_ram)) = runtime.used.get_mut(&host) else { continue };
            *used_cores += cores;
            *used_ram += ram_footprint;
            runtime.in_flight.insert(action_id);

            {
                let mut guard = job.lock();
                if let Some(action) = guard.action_mut(action_id) {
                    self.resolve_scratch_locations(action, host);
                }
            }

            let ctx = ExecutionContext {
                platform: Arc::clone(&self.platform),
                clock: self.clock.clone(),
                storage: Arc::clone(&self.storage),
            };
            let params = ActionExecutorParams {
                host,
                num_cores: cores,
                ram_footprint,
                thread_creation_overhead: self.properties.get_f64("task_startup_overhead", 0.0),
                simulate_compute_as_sleep: self.properties.get_bool("simulate_compute_as_sleep", false),
                callback_host: self.primary_host,
                callback_payload_bytes: self.properties.get_u64("executor_callback_payload_bytes", 0),
            };
            tracing::debug!(
                job = %job_id,
                action = %action_id,
                host = %host,
                cores,
                ram_footprint,
                "placing action onto executor"
            );
            let handle = action_executor::spawn(
                &self.registry,
                ctx,
                Arc::clone(&job),
                job_id,
                action_id,
                params,
                Arc::clone(&self.callback_port),
                Arc::clone(&self.custom_actions),
            );
            let executor_id = handle.id();
            runtime.executors.insert(
                executor_id,
                RunningExecutor { handle, job_id, action_id, host, cores, ram: ram_footprint },
            );
        }
    }

    /// Late-bind any `FileLocation::Scratch` reference in `action`'s kind
    /// against this service's scratch storage service, now that we know
    /// which host (and therefore which scratch mount) it will run on.
    fn resolve_scratch_locations(&self, action: &mut Action, _host: HostId) {
        let Some(scratch) = &self.scratch else { return };
        let mount = scratch.mount_point().to_path_buf();
        let resolve = |loc: &FileLocation| loc.resolve_scratch(scratch.id(), &mount);
        action.kind = match std::mem::replace(&mut action.kind, wrench_core::ActionKind::Sleep { duration_secs: 0.0 }) {
            wrench_core::ActionKind::FileRead { location } => {
                wrench_core::ActionKind::FileRead { location: resolve(&location) }
            }
            wrench_core::ActionKind::FileWrite { location } => {
                wrench_core::ActionKind::FileWrite { location: resolve(&location) }
            }
            wrench_core::ActionKind::FileCopy { src, dst } => {
                wrench_core::ActionKind::FileCopy { src: resolve(&src), dst: resolve(&dst) }
            }
            wrench_core::ActionKind::FileDelete { location } => {
                wrench_core::ActionKind::FileDelete { location: resolve(&location) }
            }
            other => other,
        };
    }

    fn choose_placement(
        &self,
        runtime: &Runtime,
        hint: Option<PlacementHint>,
        min_cores: u32,
        max_cores: u32,
        ram_footprint: u64,
    ) -> Option<(HostId, u32)> {
        let fits = |host: HostId, want_cores: Option<u32>| -> Option<(HostId, u32)> {
            if !self.platform.is_host_up(host) {
                return None;
            }
            let (capacity_cores, capacity_ram) = self.host_capacity(host)?;
            let (used_cores, used_ram) = *runtime.used.get(&host)?;
            let idle_cores = capacity_cores.saturating_sub(used_cores);
            let idle_ram = capacity_ram.saturating_sub(used_ram);
            if idle_cores < min_cores || idle_ram < ram_footprint {
                return None;
            }
            let reserve = want_cores.unwrap_or(max_cores).min(idle_cores).max(min_cores);
            Some((host, reserve))
        };

        match hint {
            Some(PlacementHint::Host { host, cores }) => fits(host, cores),
            Some(PlacementHint::Cores(cores)) => self.best_host(runtime, min_cores, ram_footprint).and_then(|host| fits(host, Some(cores))),
            None => self.best_host(runtime, min_cores, ram_footprint).and_then(|host| fits(host, None)),
        }
    }

    /// Host with the most idle cores that also has enough RAM, ties broken
    /// by host name (spec.md §4.5 step 3).
    fn best_host(&self, runtime: &Runtime, min_cores: u32, ram_footprint: u64) -> Option<HostId> {
        self.resources
            .iter()
            .filter_map(|(host, capacity_cores, capacity_ram)| {
                if !self.platform.is_host_up(*host) {
                    return None;
                }
                let (used_cores, used_ram) = *runtime.used.get(host)?;
                let idle_cores = capacity_cores.saturating_sub(used_cores);
                let idle_ram = capacity_ram.saturating_sub(used_ram);
                if idle_cores >= min_cores && idle_ram >= ram_footprint {
                    Some((*host, idle_cores))
                } else {
                    None
                }
            })
            .max_by(|(host_a, idle_a), (host_b, idle_b)| {
                idle_a.cmp(idle_b).then_with(|| host_a.as_str().cmp(host_b.as_str()))
            })
            .map(|(host, _)| host)
    }

    pub fn per_host_available_memory_capacity(&self) -> WrenchResult<HashMap<HostId, u64>> {
        self.handle.require_up()?;
        let runtime = self.runtime.lock();
        Ok(self
            .resources
            .iter()
            .map(|(host, _, capacity_ram)| {
                let used_ram = runtime.used.get(host).map(|(_, r)| *r).unwrap_or(0);
                (*host, capacity_ram.saturating_sub(used_ram))
            })
            .collect())
    }

    pub fn num_idle_cores(&self) -> WrenchResult<HashMap<HostId, u32>> {
        self.handle.require_up()?;
        let runtime = self.runtime.lock();
        Ok(self
            .resources
            .iter()
            .map(|(host, capacity_cores, _)| {
                let used_cores = runtime.used.get(host).map(|(c, _)| *c).unwrap_or(0);
                (*host, capacity_cores.saturating_sub(used_cores))
            })
            .collect())
    }

    pub fn core_flop_rate(&self) -> WrenchResult<HashMap<HostId, f64>> {
        self.handle.require_up()?;
        Ok(self
            .resources
            .iter()
            .map(|(host, _, _)| (*host, self.platform.host_flop_rate(*host).unwrap_or(0.0)))
            .collect())
    }

    /// `0.0` means "no TTL configured".
    pub fn ttl(&self) -> WrenchResult<f64> {
        self.handle.require_up()?;
        Ok(self.properties.get_f64("ttl", 0.0))
    }

    /// `canRunJob` gatekeeper (spec.md §4.5). The TTL check assumes
    /// single-core worst case (the slowest host's flop rate) and is
    /// documented there as conservative — this does not account for a job
    /// actually landing on a faster host.
    pub fn can_run_job(&self, kind: JobKind, min_cores: u32, flops: f64) -> bool {
        if !self.handle.is_up() {
            return false;
        }
        if !self.supported_kinds.contains(&kind) {
            return false;
        }
        let idle_cores = self.num_idle_cores().ok().map(|m| m.values().copied().max().unwrap_or(0)).unwrap_or(0);
        if idle_cores < min_cores {
            return false;
        }
        let ttl = self.properties.get_f64("ttl", 0.0);
        if ttl > 0.0 {
            let worst_case_flop_rate = self
                .resources
                .iter()
                .filter_map(|(host, _, _)| self.platform.host_flop_rate(*host))
                .fold(f64::INFINITY, f64::min);
            if worst_case_flop_rate.is_finite() && ttl < flops / worst_case_flop_rate {
                return false;
            }
        }
        true
    }

    /// Mirror of `PropertySchema` validation callers should run on raw
    /// properties before constructing this service, kept here so tests and
    /// controllers share one canonical schema.
    pub fn schema() -> PropertySchema {
        property_schema()
    }
}

#[cfg(test)]
#[path = "bare_metal_compute_service_tests.rs"]
mod tests;
