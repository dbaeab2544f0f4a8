// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`ActionExecutor`]: one actor spawned per action attempt (spec.md §4.4).
//! Runs the action's body, finalizes its terminal state, advances its
//! children's readiness, and reports back to whichever
//! [`crate::bare_metal_compute_service::BareMetalComputeService`] spawned
//! it.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use wrench_core::{
    ActionId, ActionKind, ActionState, CompoundJob, CompoundJobId, CustomActionTag, ExecutorId,
    FailureCause, FileId, FileLocation, HostId,
};
use wrench_kernel::{ActorHandle, ActorRegistry, CommPort, Platform, SimClock, TraceEventKind};

use crate::storage_directory::StorageDirectory;
use crate::storage_service::{self, StorageService};

/// The body of an `ActionKind::Custom` action. `wrench-core` only carries
/// the tag (a name) since the body itself is an execution-environment
/// concern; an `ExecutionController` registers one of these per tag it
/// uses.
pub trait CustomActionBody: Send + Sync {
    fn run(&self) -> Result<(), FailureCause>;
}

pub type CustomActionRegistry = HashMap<String, Arc<dyn CustomActionBody>>;

/// What an executor needs to actually run an action's body: the simulated
/// hardware, the clock, and where to resolve a `FileLocation` to a running
/// `StorageService`.
#[derive(Clone)]
pub struct ExecutionContext {
    pub platform: Arc<Platform>,
    pub clock: SimClock,
    pub storage: Arc<StorageDirectory>,
}

/// Sent to the spawning compute service's callback port when an executor
/// finishes, one way or another. The action's final state lives on the
/// action itself (in the shared job); this is just the "go look" signal.
pub struct ActionExecutorDone {
    pub executor_id: ExecutorId,
    pub job: CompoundJobId,
    pub action: ActionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillReason {
    /// `terminateJob` or an explicit kill.
    Killed,
    /// The host the action was running on crashed.
    HostCrash,
}

/// Parameters fixed for the lifetime of one execution attempt (spec.md
/// §4.4: "{host, num_cores, ram_footprint, thread_creation_overhead,
/// simulate_compute_as_sleep, callback_port, action}").
pub struct ActionExecutorParams {
    pub host: HostId,
    pub num_cores: u32,
    pub ram_footprint: u64,
    pub thread_creation_overhead: f64,
    pub simulate_compute_as_sleep: bool,
    /// The compute service's own host, for billing the
    /// `ActionExecutorDone` callback's `payload_map` cost (spec.md §4.1)
    /// across the route back from `host`. Usually the service's primary
    /// host, not necessarily the same as `host` itself.
    pub callback_host: HostId,
    /// Bytes billed on the executor-to-service callback message, read from
    /// the service's `executor_callback_payload_bytes` property. `0` bills
    /// no network time regardless of route (spec.md §4.1's `payload_map`
    /// narrowed to the one seam in this architecture where both endpoints
    /// resolve to real hosts — see DESIGN.md).
    pub callback_payload_bytes: u64,
}

/// A handle the compute service keeps per running executor, for the kill
/// contract (spec.md §4.4).
pub struct ActionExecutorHandle {
    id: ExecutorId,
    actor: ActorHandle,
    kill_reason: Arc<Mutex<Option<KillReason>>>,
}

impl ActionExecutorHandle {
    pub fn id(&self) -> ExecutorId {
        self.id
    }

    /// Atomically (under the per-executor lock) kill the actor and mark
    /// why, so `on_exit` can finalize the action as KILLED rather than
    /// FAILED. A no-op if the executor already reported a reason (it had
    /// already finished or was already being killed).
    pub fn kill(&self) {
        let mut reason = self.kill_reason.lock();
        if reason.is_none() {
            *reason = Some(KillReason::Killed);
        }
        drop(reason);
        self.actor.kill();
    }

    /// The host this executor's action is running on just went down.
    pub fn fail_due_to_host_crash(&self) {
        let mut reason = self.kill_reason.lock();
        if reason.is_none() {
            *reason = Some(KillReason::HostCrash);
        }
        drop(reason);
        self.actor.kill();
    }

    pub async fn join(self) {
        self.actor.join().await;
    }
}

/// Spawn the executor actor. The compound job is shared (an `Arc<Mutex<_>>`
/// owned by the compute service) since several executors run actions of
/// the same job concurrently.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    registry: &ActorRegistry,
    ctx: ExecutionContext,
    job: Arc<Mutex<CompoundJob>>,
    job_id: CompoundJobId,
    action_id: ActionId,
    params: ActionExecutorParams,
    callback_port: Arc<CommPort<ActionExecutorDone>>,
    custom_actions: Arc<CustomActionRegistry>,
) -> ActionExecutorHandle {
    let id = ExecutorId::new();
    let kill_reason: Arc<Mutex<Option<KillReason>>> = Arc::new(Mutex::new(None));
    let kill_reason_for_body = Arc::clone(&kill_reason);

    let actor = registry.spawn(move |mut kill_switch| async move {
        let start = ctx.clock.now();
        {
            let mut guard = job.lock();
            if let Some(action) = guard.action_mut(action_id) {
                action.begin_attempt(start, params.num_cores, params.ram_footprint, params.host);
            }
        }
        let trace_start = ctx.platform.trace().start(TraceEventKind::TaskStart, start, None, None, Some(params.host));

        if params.thread_creation_overhead > 0.0 {
            ctx.clock.sleep_for(params.thread_creation_overhead).await;
        }

        let kind = {
            let guard = job.lock();
            guard.action(action_id).map(|a| a.kind.clone())
        };

        let body = async {
            match kind {
                Some(kind) => {
                    execute(&ctx, params.host, params.num_cores, params.simulate_compute_as_sleep, &kind, &custom_actions)
                        .await
                }
                None => Err(FailureCause::invalid_argument("action removed from its job while running")),
            }
        };

        let outcome: Option<Result<(), FailureCause>> = tokio::select! {
            biased;
            () = kill_switch.killed() => None,
            result = body => Some(result),
        };

        let end = ctx.clock.now();
        let (final_state, cause) = match outcome {
            Some(Ok(())) => (ActionState::Completed, None),
            Some(Err(cause)) => (ActionState::Failed, Some(cause)),
            None => match kill_reason_for_body.lock().unwrap_or(KillReason::HostCrash) {
                KillReason::Killed => {
                    (ActionState::Killed, Some(FailureCause::JobKilled { action: Some(action_id) }))
                }
                KillReason::HostCrash => (ActionState::Failed, Some(FailureCause::host_error(params.host.to_string()))),
            },
        };

        {
            let mut guard = job.lock();
            if let Some(action) = guard.action_mut(action_id) {
                if !action.state.is_terminal() {
                    action.finish_attempt(end, final_state, cause);
                }
            }
            if final_state == ActionState::Completed {
                guard.propagate_ready(action_id);
            }
        }

        let trace_end_kind = match final_state {
            ActionState::Completed => TraceEventKind::TaskCompletion,
            ActionState::Killed => TraceEventKind::TaskTermination,
            _ => TraceEventKind::TaskFailure,
        };
        ctx.platform.trace().end(trace_start, trace_end_kind, end);
        tracing::debug!(job = %job_id, action = %action_id, host = %params.host, state = ?final_state, "executor finished");

        // Per spec.md §4.4 step 4: a NetworkError on the callback just
        // means our parent is already gone. Nothing to retry.
        let link = ctx.platform.route(params.host, params.callback_host);
        let _ = callback_port
            .put_billed(
                ActionExecutorDone { executor_id: id, job: job_id, action: action_id },
                params.callback_payload_bytes,
                link,
            )
            .await;
    });

    ActionExecutorHandle { id, actor, kill_reason }
}

/// Resolve a `FileLocation` to the `StorageService` that owns it, the
/// directory to pass to that service's filesystem calls, the file id, and
/// its registered size. Shared with `DataMovementManager`, which resolves
/// locations the same way outside of any action executor.
pub fn resolve_location(
    storage: &StorageDirectory,
    location: &FileLocation,
) -> Result<(Arc<StorageService>, PathBuf, FileId, u64), FailureCause> {
    let file = location.file();
    let size = storage.file_size(file).unwrap_or(0);
    let service_id = location
        .storage_service()
        .ok_or_else(|| FailureCause::invalid_argument("file location did not resolve to a concrete storage service"))?;
    let service = storage
        .service(service_id)
        .ok_or_else(|| FailureCause::invalid_argument("file location references an unknown storage service"))?;
    let directory = match location {
        FileLocation::Concrete { path_at_mount, .. } => path_at_mount.clone(),
        _ => PathBuf::from("/"),
    };
    Ok((service, directory, file, size))
}

async fn execute(
    ctx: &ExecutionContext,
    host: HostId,
    num_cores: u32,
    simulate_compute_as_sleep: bool,
    kind: &ActionKind,
    custom_actions: &CustomActionRegistry,
) -> Result<(), FailureCause> {
    match kind {
        ActionKind::Sleep { duration_secs } => {
            ctx.clock.sleep_for(*duration_secs).await;
            Ok(())
        }
        ActionKind::Compute { flops } => {
            // `simulate_compute_as_sleep` is a no-op here: neither path
            // runs real floating-point work, since there's nothing for the
            // simulator to compute other than the modeled duration. The
            // flag exists for parity with an executor that *could* burn
            // real CPU cycles for fidelity at the cost of wall-clock time.
            let _ = simulate_compute_as_sleep;
            let flop_rate = ctx.platform.host_flop_rate(host).unwrap_or(1.0).max(f64::MIN_POSITIVE);
            let cores = (num_cores.max(1)) as f64;
            ctx.clock.sleep_for(flops / (flop_rate * cores)).await;
            Ok(())
        }
        ActionKind::FileRead { location } => {
            let (service, directory, file, size) = resolve_location(&ctx.storage, location)?;
            let link = ctx.platform.route(host, service.host());
            service.read_file_over(&directory, file, size, link).await.map_err(|e| e.0)
        }
        ActionKind::FileWrite { location } => {
            let (service, directory, file, size) = resolve_location(&ctx.storage, location)?;
            let link = ctx.platform.route(host, service.host());
            service.write_file_over(&directory, file, size, link).await.map_err(|e| e.0)
        }
        ActionKind::FileCopy { src, dst } => {
            let (src_service, src_dir, file, size) = resolve_location(&ctx.storage, src)?;
            let (dst_service, dst_dir, _, _) = resolve_location(&ctx.storage, dst)?;
            let link = ctx.platform.route(src_service.host(), dst_service.host());
            storage_service::copy_file(&src_service, &src_dir, &dst_service, &dst_dir, file, size, link)
                .await
                .map_err(|e| e.0)
        }
        ActionKind::FileDelete { location } => {
            let (service, _directory, file, _size) = resolve_location(&ctx.storage, location)?;
            service.delete_file(file).map_err(|e| e.0)?;
            Ok(())
        }
        ActionKind::Custom(CustomActionTag(tag)) => {
            let body = custom_actions.get(tag).ok_or_else(|| FailureCause::FunctionalityNotAvailable {
                detail: format!("no custom action body registered for '{tag}'"),
            })?;
            body.run()
        }
    }
}

#[cfg(test)]
#[path = "action_executor_tests.rs"]
mod tests;
