// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`PilotJob`]: a resource reservation that, once granted, exposes a
//! dynamically created child compute service over its slice of resources.

use crate::ids::{PilotJobId, ServiceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PilotJobState {
    NotSubmitted,
    Pending,
    Started,
    Expired,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestedResources {
    pub num_hosts: u32,
    pub cores_per_host: u32,
    pub ram_per_host: u64,
}

#[derive(Debug, Clone)]
pub struct PilotJob {
    pub id: PilotJobId,
    pub requested_resources: RequestedResources,
    /// Seconds from the grant time after which the pilot job's reservation
    /// expires; `None` means it runs until explicitly terminated.
    pub expiration_secs: Option<f64>,
    pub state: PilotJobState,
    /// Set once the pilot job is started and a child compute service has
    /// been created over its granted slice.
    pub child_compute_service: Option<ServiceId>,
}

impl PilotJob {
    pub fn new(requested_resources: RequestedResources, expiration_secs: Option<f64>) -> Self {
        Self {
            id: PilotJobId::new(),
            requested_resources,
            expiration_secs,
            state: PilotJobState::NotSubmitted,
            child_compute_service: None,
        }
    }
}

#[cfg(test)]
#[path = "pilot_job_tests.rs"]
mod tests;
