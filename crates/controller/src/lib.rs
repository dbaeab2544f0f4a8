// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wrench-controller: the top of the stack — [`simulation::Simulation`]
//! (the single owner of the kernel clock, actor registry, platform, and
//! process-wide arenas a run needs) and the
//! [`execution_controller::ExecutionController`] trait a user-written
//! actor implements to drive one (spec.md §4.9), plus the CLI-flag-shaped
//! [`config::SimulationConfig`] those flags are modeled as, since no real
//! CLI parser is in scope here. The simulation-output trace itself
//! ([`wrench_kernel::SimulationTrace`], spec.md §6) lives in the kernel,
//! since the services that record to it sit below this crate.

pub mod config;
pub mod execution_controller;
pub mod simulation;

pub use config::SimulationConfig;
pub use execution_controller::{spawn_timer, ExecutionController};
pub use simulation::Simulation;
pub use wrench_kernel::{SimulationTrace, TraceEntry, TraceEntryId, TraceEventKind};
