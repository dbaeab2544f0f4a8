// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`ExecutionController`]: the user-written actor that drives a
//! simulation (spec.md §4.9) — creates a [`wrench_managers::JobManager`]
//! and [`wrench_managers::DataMovementManager`], submits jobs/copies,
//! waits for events, and dispatches each to a typed handler. Default
//! handlers do nothing; an implementor overrides only the event kinds it
//! cares about. Unhandled event kinds are *not* a simulator error (spec.md
//! §4.9: "controllers may raise; this is treated as a user error"), so
//! the default dispatch simply no-ops rather than panicking or erroring.

use std::sync::Arc;

use async_trait::async_trait;
use wrench_core::{CompoundJobId, FailureCause, FileId, PilotJobId, ServiceId, StandardJobId, WrenchResult};
use wrench_kernel::{ActorRegistry, CommPort, SimClock};
use wrench_managers::ExecutionEvent;

/// Arm a one-shot timer: after `delay_secs` of simulated time, a
/// `TimerGoesOff { name }` event lands on `controller_port`. Mirrors
/// spec.md §6's `TimerGoesOff` controller-visible event, which (per
/// spec.md §4.8) is "fired by an `ExecutionController`'s own timer, not
/// by a manager" — this is the actor that fires it.
pub fn spawn_timer(
    registry: &ActorRegistry,
    clock: SimClock,
    controller_port: Arc<CommPort<ExecutionEvent>>,
    name: impl Into<String>,
    delay_secs: f64,
) {
    let name = name.into();
    registry.spawn(move |mut kill_switch| async move {
        tokio::select! {
            biased;
            () = kill_switch.killed() => {}
            () = clock.sleep_for(delay_secs) => {
                let _ = controller_port.put(ExecutionEvent::TimerGoesOff { name });
            }
        }
    });
}

/// The event-loop contract a simulation driver implements. Only
/// [`ExecutionController::controller_port`] is required; everything else
/// has a working default.
#[async_trait]
pub trait ExecutionController: Send + Sync {
    /// The `CommPort` every `JobManager`/`DataMovementManager` this
    /// controller owns reports `ExecutionEvent`s onto.
    fn controller_port(&self) -> &Arc<CommPort<ExecutionEvent>>;

    /// `waitForNextEvent(timeout?)`: blocks for at most `timeout` seconds
    /// of simulated time (or indefinitely if `None`). Returns `Ok(None)`
    /// on a timeout expiry, not an error — only a link/host failure on
    /// the port itself is surfaced as `Err`.
    async fn wait_for_next_event(&self, timeout: Option<f64>) -> WrenchResult<Option<ExecutionEvent>> {
        let port = self.controller_port();
        match timeout {
            Some(timeout) => match port.get_with_timeout(timeout).await {
                Ok(event) => Ok(Some(event)),
                Err(FailureCause::NetworkError { timeout: true, .. }) => Ok(None),
                Err(cause) => Err(cause.into()),
            },
            None => port.get().await.map(Some).map_err(Into::into),
        }
    }

    /// `waitForAndProcessNextEvent`: block for the next event (no
    /// timeout) and dispatch it to a typed handler. A no-op if the port
    /// never receives anything (simulation has nothing left to report).
    async fn wait_for_and_process_next_event(&self) -> WrenchResult<()> {
        if let Some(event) = self.wait_for_next_event(None).await? {
            self.process_event(event).await?;
        }
        Ok(())
    }

    /// Dispatch one already-received event to its typed handler.
    /// Exposed separately from `wait_for_and_process_next_event` so a
    /// controller driving its own `select!` loop (e.g. racing the
    /// controller port against something else) can still reuse the
    /// dispatch table.
    async fn process_event(&self, event: ExecutionEvent) -> WrenchResult<()> {
        match event {
            ExecutionEvent::StandardJobCompleted { job, compute_service } => {
                self.on_standard_job_completed(job, compute_service).await
            }
            ExecutionEvent::StandardJobFailed { job, compute_service, failure_cause } => {
                self.on_standard_job_failed(job, compute_service, failure_cause).await
            }
            ExecutionEvent::CompoundJobCompleted { job, compute_service } => {
                self.on_compound_job_completed(job, compute_service).await
            }
            ExecutionEvent::CompoundJobFailed { job, compute_service, failure_cause } => {
                self.on_compound_job_failed(job, compute_service, failure_cause).await
            }
            ExecutionEvent::PilotJobStarted { pilot_job, compute_service } => {
                self.on_pilot_job_started(pilot_job, compute_service).await
            }
            ExecutionEvent::PilotJobExpired { pilot_job } => self.on_pilot_job_expired(pilot_job).await,
            ExecutionEvent::FileCopyCompleted { file, src, dst } => self.on_file_copy_completed(file, src, dst).await,
            ExecutionEvent::FileCopyFailed { file, src, dst, failure_cause } => {
                self.on_file_copy_failed(file, src, dst, failure_cause).await
            }
            ExecutionEvent::TimerGoesOff { name } => self.on_timer_goes_off(name).await,
        }
    }

    async fn on_standard_job_completed(&self, _job: StandardJobId, _compute_service: ServiceId) -> WrenchResult<()> {
        Ok(())
    }

    async fn on_standard_job_failed(
        &self,
        _job: StandardJobId,
        _compute_service: ServiceId,
        _failure_cause: FailureCause,
    ) -> WrenchResult<()> {
        Ok(())
    }

    async fn on_compound_job_completed(&self, _job: CompoundJobId, _compute_service: ServiceId) -> WrenchResult<()> {
        Ok(())
    }

    async fn on_compound_job_failed(
        &self,
        _job: CompoundJobId,
        _compute_service: ServiceId,
        _failure_cause: FailureCause,
    ) -> WrenchResult<()> {
        Ok(())
    }

    async fn on_pilot_job_started(&self, _pilot_job: PilotJobId, _compute_service: ServiceId) -> WrenchResult<()> {
        Ok(())
    }

    async fn on_pilot_job_expired(&self, _pilot_job: PilotJobId) -> WrenchResult<()> {
        Ok(())
    }

    async fn on_file_copy_completed(&self, _file: FileId, _src: ServiceId, _dst: ServiceId) -> WrenchResult<()> {
        Ok(())
    }

    async fn on_file_copy_failed(
        &self,
        _file: FileId,
        _src: ServiceId,
        _dst: ServiceId,
        _failure_cause: FailureCause,
    ) -> WrenchResult<()> {
        Ok(())
    }

    async fn on_timer_goes_off(&self, _name: String) -> WrenchResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "execution_controller_tests.rs"]
mod tests;
