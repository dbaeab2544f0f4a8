// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`FailureCause`] taxonomy: a tagged variant describing every
//! recoverable or fatal error a simulated service can report, plus the
//! single cross-boundary error type ([`WrenchError`]) that wraps it.

use crate::ids::{ActionId, CompoundJobId, FileId, ServiceId};
use std::fmt;
use thiserror::Error;

/// Every failure a service, action, or job can report.
///
/// This is the *only* error taxonomy crossing a service boundary — it is
/// carried both by [`WrenchError`] (the synchronous/exception channel) and
/// by `ExecutionEvent`s that report a job's terminal outcome (the
/// asynchronous/event channel). Internal retries and state-machine
/// bookkeeping do not need their own error type; they reuse this one.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureCause {
    /// The host executing an action or service went down mid-operation.
    HostError { host: String },
    /// A network-level failure moving a message or file between two
    /// endpoints. `timeout` distinguishes a deadline expiry from a link
    /// actually going down.
    NetworkError { timeout: bool, detail: String },
    /// The target service is `DOWN` and rejected the request.
    ServiceIsDown { service: ServiceId },
    /// The target service is `SUSPENDED` and rejected the request.
    ServiceIsSuspended { service: ServiceId },
    /// Not enough cores/RAM exist anywhere to ever run this job, even
    /// under the best placement.
    NotEnoughResources { job: CompoundJobId, service: ServiceId },
    /// A storage operation referenced a file that is not present at the
    /// location.
    FileNotFound { file: FileId },
    /// Not enough free space on the target mount to reserve a file.
    NotEnoughSpace { file: FileId },
    /// A compound job reached a terminal state with at least one
    /// non-`COMPLETED` action.
    SomeActionsHaveFailed,
    /// An action or job was killed via `terminateJob`.
    JobKilled { action: Option<ActionId> },
    /// A job exceeded its requested time-to-live.
    JobTimeout,
    /// A caller-supplied argument failed validation before the request
    /// entered any queue.
    InvalidArgument { message: String },
    /// A message of unknown type arrived on a control port. Fatal: the
    /// caller should abort the simulation, not retry.
    FunctionalityNotAvailable { detail: String },
}

impl FailureCause {
    pub fn host_error(host: impl Into<String>) -> Self {
        FailureCause::HostError { host: host.into() }
    }

    pub fn network_timeout(detail: impl Into<String>) -> Self {
        FailureCause::NetworkError { timeout: true, detail: detail.into() }
    }

    pub fn network_error(detail: impl Into<String>) -> Self {
        FailureCause::NetworkError { timeout: false, detail: detail.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        FailureCause::InvalidArgument { message: message.into() }
    }

    /// Typed accessor mirroring `FileNotFound.getFile()` in the original
    /// exception taxonomy. Returns `None` for every other variant.
    pub fn file(&self) -> Option<FileId> {
        match self {
            FailureCause::FileNotFound { file } | FailureCause::NotEnoughSpace { file } => {
                Some(*file)
            }
            _ => None,
        }
    }

    /// Typed accessor mirroring `NotEnoughResources.getJob()`.
    pub fn job(&self) -> Option<CompoundJobId> {
        match self {
            FailureCause::NotEnoughResources { job, .. } => Some(*job),
            _ => None,
        }
    }

    /// Typed accessor mirroring `ServiceIsDown.getService()` /
    /// `ServiceIsSuspended.getService()`.
    pub fn service(&self) -> Option<ServiceId> {
        match self {
            FailureCause::ServiceIsDown { service }
            | FailureCause::ServiceIsSuspended { service }
            | FailureCause::NotEnoughResources { service, .. } => Some(*service),
            _ => None,
        }
    }

    /// Whether this cause is recoverable at the executor boundary (i.e.
    /// retryable under the compute service's crash-retry policy), as
    /// opposed to something that should always terminate the job.
    pub fn is_executor_crash(&self) -> bool {
        matches!(self, FailureCause::HostError { .. })
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::HostError { host } => write!(f, "host '{host}' failed"),
            FailureCause::NetworkError { timeout: true, detail } => {
                write!(f, "network timeout: {detail}")
            }
            FailureCause::NetworkError { timeout: false, detail } => {
                write!(f, "network error: {detail}")
            }
            FailureCause::ServiceIsDown { service } => write!(f, "service '{service}' is down"),
            FailureCause::ServiceIsSuspended { service } => {
                write!(f, "service '{service}' is suspended")
            }
            FailureCause::NotEnoughResources { job, service } => {
                write!(f, "job '{job}' cannot be satisfied by service '{service}'")
            }
            FailureCause::FileNotFound { file } => write!(f, "file '{file}' not found"),
            FailureCause::NotEnoughSpace { file } => {
                write!(f, "not enough space to create file '{file}'")
            }
            FailureCause::SomeActionsHaveFailed => write!(f, "some actions have failed"),
            FailureCause::JobKilled { action: Some(a) } => {
                write!(f, "job killed while action '{a}' was running")
            }
            FailureCause::JobKilled { action: None } => write!(f, "job killed"),
            FailureCause::JobTimeout => write!(f, "job exceeded its time-to-live"),
            FailureCause::InvalidArgument { message } => write!(f, "invalid argument: {message}"),
            FailureCause::FunctionalityNotAvailable { detail } => {
                write!(f, "functionality not available: {detail}")
            }
        }
    }
}

/// The single exception-shaped type crossing a service's public boundary.
/// Internal failures flow as plain return values or action-state
/// transitions; this is only ever surfaced at an API call that cannot
/// otherwise report an error (submission gates, argument validation).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct WrenchError(pub FailureCause);

impl From<FailureCause> for WrenchError {
    fn from(cause: FailureCause) -> Self {
        WrenchError(cause)
    }
}

pub type WrenchResult<T> = Result<T, WrenchError>;

#[cfg(test)]
#[path = "failure_tests.rs"]
mod tests;
