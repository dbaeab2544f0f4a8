// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actor spawn/kill: every service and executor the simulator runs is one
//! of these. An actor is just an async block plus a cooperative
//! [`KillSwitch`] it is expected to poll at its await points — there is no
//! preemptive cancellation, matching how `ActionExecutor::kill()` and
//! `Service::stop()` are specified to behave (best-effort, observed at the
//! next yield point, not instantaneous).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative kill signal handed to a spawned actor body.
#[derive(Clone)]
pub struct KillSwitch(watch::Receiver<bool>);

impl KillSwitch {
    pub fn is_killed(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the actor has been killed. Actors that have no
    /// natural await point to race this against should periodically poll
    /// [`KillSwitch::is_killed`] instead.
    pub async fn killed(&mut self) {
        let _ = self.0.changed().await;
    }
}

pub struct ActorHandle {
    kill_tx: watch::Sender<bool>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl ActorHandle {
    /// Best-effort, cooperative kill: sets the flag the actor's
    /// [`KillSwitch`] observes. Does not forcibly abort the task.
    pub fn kill(&self) {
        let _ = self.kill_tx.send(true);
    }

    pub async fn join(mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.await;
        }
    }
}

/// Tracks how many spawned actors are still alive, so the reactor can
/// tell "every live actor is parked" from "the simulation is over".
#[derive(Clone, Default)]
pub struct ActorRegistry {
    active: Arc<AtomicUsize>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawn an actor body. `f` receives a [`KillSwitch`] it should check
    /// at every await point it controls.
    pub fn spawn<F, Fut>(&self, f: F) -> ActorHandle
    where
        F: FnOnce(KillSwitch) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (kill_tx, kill_rx) = watch::channel(false);
        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::SeqCst);
        let body = f(KillSwitch(kill_rx));
        let join = tokio::spawn(async move {
            body.await;
            active.fetch_sub(1, Ordering::SeqCst);
        });
        ActorHandle { kill_tx, join: Some(join) }
    }
}

#[cfg(test)]
#[path = "actor_tests.rs"]
mod tests;
