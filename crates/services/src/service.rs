// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared service lifecycle: every `StorageService` and
//! `BareMetalComputeService` embeds a [`ServiceHandle`] rather than
//! implementing its own up/down/suspended bookkeeping. `UP -> DOWN` is
//! permanent (a stopped service is never restarted); `UP <-> SUSPENDED`
//! toggles freely (spec.md §3).

use parking_lot::Mutex;
use std::sync::Arc;
use wrench_core::{FailureCause, HostId, ServiceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Up,
    Suspended,
    Down,
}

/// Common identity and lifecycle state shared by every service kind.
/// Cheaply `Clone`-able (the state is behind an `Arc<Mutex<_>>`) so both
/// the service's own actor and any manager holding a reference can query
/// or flip it.
#[derive(Clone)]
pub struct ServiceHandle {
    id: ServiceId,
    host: HostId,
    state: Arc<Mutex<ServiceState>>,
}

impl ServiceHandle {
    pub fn new(host: HostId) -> Self {
        Self { id: ServiceId::new(), host, state: Arc::new(Mutex::new(ServiceState::Up)) }
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn host(&self) -> HostId {
        self.host
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    pub fn is_up(&self) -> bool {
        self.state() == ServiceState::Up
    }

    pub fn suspend(&self) {
        let mut state = self.state.lock();
        if *state == ServiceState::Up {
            *state = ServiceState::Suspended;
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        if *state == ServiceState::Suspended {
            *state = ServiceState::Up;
        }
    }

    /// Permanent: a service that has been stopped never transitions again.
    pub fn stop(&self) {
        *self.state.lock() = ServiceState::Down;
    }

    /// Reject a request if the service isn't `UP`, mapping to the
    /// matching `FailureCause` variant (spec.md §7).
    pub fn require_up(&self) -> Result<(), FailureCause> {
        match self.state() {
            ServiceState::Up => Ok(()),
            ServiceState::Suspended => Err(FailureCause::ServiceIsSuspended { service: self.id }),
            ServiceState::Down => Err(FailureCause::ServiceIsDown { service: self.id }),
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
