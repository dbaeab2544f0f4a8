// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers for every arena-keyed entity in the simulator.
//!
//! Each is a newtype over [`crate::id::IdBuf`] generated by
//! [`crate::define_id`] — stable, `Copy`, comparable by value, and safe to
//! store in adjacency lists without leaking ownership (see the "Cyclic and
//! back-pointer graphs" design note: arenas hold entities, everything else
//! holds ids).

crate::define_id! {
    /// Identifies a [`crate::datafile::DataFile`], unique across the simulation.
    pub struct FileId("file");
}

crate::define_id! {
    /// Identifies a [`crate::action::Action`] within its owning [`crate::compound_job::CompoundJob`].
    pub struct ActionId("actn");
}

crate::define_id! {
    /// Identifies a [`crate::compound_job::CompoundJob`].
    pub struct CompoundJobId("cjob");
}

crate::define_id! {
    /// Identifies a [`crate::standard_job::StandardJob`].
    pub struct StandardJobId("sjob");
}

crate::define_id! {
    /// Identifies a [`crate::pilot_job::PilotJob`].
    pub struct PilotJobId("pjob");
}

crate::define_id! {
    /// Identifies a [`crate::workflow::WorkflowTask`].
    pub struct TaskId("task");
}

crate::define_id! {
    /// Identifies any named service (compute or storage) in the simulation.
    pub struct ServiceId("svc-");
}

crate::define_id! {
    /// Identifies a simulated host.
    pub struct HostId("host");
}

crate::define_id! {
    /// Identifies a named [`CommPort`](crate) message channel.
    pub struct CommPortId("port");
}

crate::define_id! {
    /// Identifies one attempt of an [`crate::action::Action`] spawned onto an executor.
    pub struct ExecutorId("exec");
}
