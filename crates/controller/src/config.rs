// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`SimulationConfig`]: the CLI flags a real `wrench`-based simulator
//! would expose on its simulated host (spec.md §6) — modeled as a plain
//! struct of booleans rather than parsed from `std::env::args` directly,
//! since a CLI entry point is an explicit out-of-core collaborator. A
//! real binary would parse these with `clap` the way the teacher's own
//! CLI crate does; that binary itself is not this crate's job.

/// Opt-in fault/fidelity models a simulator host can enable. All default
/// to `false`: without them a host never crashes, a link never goes
/// down, every trace event is kept but logging stays terse, and disk
/// reads never get a page-cache discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimulationConfig {
    /// `--wrench-host-shutdown-simulation`: allow
    /// [`crate::Simulation::crash_host`] fault injection to actually be
    /// invoked by a controller. `Platform::crash_host` itself stays
    /// ungated for kernel-level tests that want to crash a host without
    /// going through a `Simulation` at all.
    pub host_shutdown_simulation: bool,
    /// `--wrench-link-shutdown-simulation`: the same gate for
    /// [`crate::Simulation::crash_link`].
    pub link_shutdown_simulation: bool,
    /// `--wrench-full-log`: emit a `tracing` event per state transition
    /// rather than only per terminal outcome.
    pub full_log: bool,
    /// `--wrench-pagecache-simulation`: model a page cache discount on
    /// repeated disk reads of the same file. Not modeled by the storage
    /// service in this crate (no page-cache layer is implemented); kept
    /// here only so the flag round-trips for a controller that wants to
    /// assert on it.
    pub pagecache_simulation: bool,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from the flag strings themselves (e.g. `std::env::args()`
    /// already filtered to the ones this crate recognizes), ignoring
    /// anything else — a real CLI parser would error on an unknown flag,
    /// but recognizing only ours is enough for the test/embedding use
    /// case this crate actually serves.
    pub fn from_flags<'a>(flags: impl IntoIterator<Item = &'a str>) -> Self {
        let mut config = Self::default();
        for flag in flags {
            match flag {
                "--wrench-host-shutdown-simulation" => config.host_shutdown_simulation = true,
                "--wrench-link-shutdown-simulation" => config.link_shutdown_simulation = true,
                "--wrench-full-log" => config.full_log = true,
                "--wrench-pagecache-simulation" => config.pagecache_simulation = true,
                _ => {}
            }
        }
        config
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
