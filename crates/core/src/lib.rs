// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wrench-core: data model and pure state machines for the discrete-event
//! workflow simulator — ids, the [`FailureCause`] taxonomy, files and file
//! locations, the logical filesystem, actions and compound jobs, workflow
//! tasks, and the standard/pilot job wrappers. No I/O, no clock, no
//! actors: those live in `wrench-kernel` and `wrench-services`.

pub mod macros;

pub mod action;
pub mod compound_job;
pub mod datafile;
pub mod failure;
pub mod file_location;
pub mod id;
pub mod ids;
pub mod logical_fs;
pub mod pilot_job;
pub mod property_map;
pub mod standard_job;
pub mod workflow;

pub use action::{Action, ActionAttempt, ActionKind, ActionState, CustomActionTag};
pub use compound_job::{CompoundJob, CompoundJobState};
pub use datafile::DataFile;
pub use failure::{FailureCause, WrenchError, WrenchResult};
pub use file_location::{FileLocation, FileRegistry};
pub use ids::{
    ActionId, CommPortId, CompoundJobId, ExecutorId, FileId, HostId, PilotJobId, ServiceId,
    StandardJobId, TaskId,
};
pub use logical_fs::LogicalFileSystem;
pub use pilot_job::{PilotJob, PilotJobState, RequestedResources};
pub use property_map::{PropertyKind, PropertyMap, PropertySchema};
pub use standard_job::{FileCopySpec, FileDeleteSpec, StandardJob, StandardJobState};
pub use workflow::{TaskState, Workflow, WorkflowTask};
