// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`Simulation`]: the single top-level owner of the kernel clock, actor
//! registry, platform, and process-wide arenas (Design Notes §9: "The
//! simulation has exactly one kernel and one process-wide file/host
//! arena... no free-standing globals survive its destruction"). A
//! `Simulation` must be constructed before any service is added, and its
//! platform instantiated exactly once before `launch()` — both are fatal
//! conditions per spec.md §7 ("attempting to run the simulation before
//! platform instantiation", "double platform instantiation").

use std::sync::Arc;

use parking_lot::Mutex;
use wrench_core::{FailureCause, HostId, WrenchResult};
use wrench_core::Workflow;
use wrench_kernel::{ActorRegistry, Platform, PlatformBuilder, Reactor, SimClock};
use wrench_services::action_executor::CustomActionRegistry;
use wrench_services::storage_directory::StorageDirectory;

use crate::config::SimulationConfig;

/// Owns everything a run needs that isn't itself a service: the virtual
/// clock, the actor registry the reactor drains, the simulated hardware
/// (once instantiated), the process-wide storage-service/file-size
/// directory, the abstract workflow arena, the custom-action-body
/// registry, and the CLI-flag-shaped config. The output trace
/// ([`wrench_kernel::SimulationTrace`]) is not kept here separately — it
/// lives on the platform itself (`self.platform()?.trace()`), since that's
/// the one `Arc` every recording service already holds; a second,
/// disconnected trace on `Simulation` would just be an easy-to-miss second
/// place for events to land.
pub struct Simulation {
    clock: SimClock,
    registry: ActorRegistry,
    platform: Mutex<Option<Arc<Platform>>>,
    storage: Arc<StorageDirectory>,
    workflow: Arc<Mutex<Workflow>>,
    custom_actions: Arc<CustomActionRegistry>,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            clock: SimClock::new(),
            registry: ActorRegistry::new(),
            platform: Mutex::new(None),
            storage: Arc::new(StorageDirectory::new()),
            workflow: Arc::new(Mutex::new(Workflow::new())),
            custom_actions: Arc::new(CustomActionRegistry::new()),
            config,
        }
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    pub fn storage_directory(&self) -> &Arc<StorageDirectory> {
        &self.storage
    }

    pub fn workflow(&self) -> &Arc<Mutex<Workflow>> {
        &self.workflow
    }

    pub fn custom_actions(&self) -> &Arc<CustomActionRegistry> {
        &self.custom_actions
    }

    pub fn config(&self) -> SimulationConfig {
        self.config
    }

    /// Build and install the platform. Fatal (spec.md §7) if called
    /// twice — the second call returns `InvalidArgument` rather than
    /// silently replacing the first platform out from under services
    /// that already hold an `Arc` to it.
    pub fn instantiate_platform(&self, builder: PlatformBuilder) -> WrenchResult<Arc<Platform>> {
        let mut guard = self.platform.lock();
        if guard.is_some() {
            return Err(FailureCause::invalid_argument("platform already instantiated").into());
        }
        let platform = Arc::new(builder.build()?);
        *guard = Some(Arc::clone(&platform));
        Ok(platform)
    }

    /// The instantiated platform, or `InvalidArgument` if
    /// `instantiate_platform` hasn't run yet.
    pub fn platform(&self) -> WrenchResult<Arc<Platform>> {
        self.platform
            .lock()
            .clone()
            .ok_or_else(|| FailureCause::invalid_argument("platform has not been instantiated yet").into())
    }

    pub fn is_platform_instantiated(&self) -> bool {
        self.platform.lock().is_some()
    }

    /// Fault injection gated on `--wrench-host-shutdown-simulation`
    /// (spec.md §6). A kernel test exercising `Platform::crash_host`
    /// directly doesn't go through here and isn't gated — this is the
    /// controller-facing entry point a `SimulationConfig`-aware caller
    /// should use instead of reaching into the platform itself.
    pub fn crash_host(&self, host: HostId) -> WrenchResult<()> {
        if !self.config.host_shutdown_simulation {
            return Err(FailureCause::FunctionalityNotAvailable {
                detail: "host-shutdown fault injection requires --wrench-host-shutdown-simulation".into(),
            }
            .into());
        }
        self.platform()?.crash_host(host);
        Ok(())
    }

    /// Reboot is never gated on its own: a host brought down through
    /// [`Self::crash_host`] should always be recoverable regardless of
    /// whether the flag that allowed crashing it is still set.
    pub fn reboot_host(&self, host: HostId) -> WrenchResult<()> {
        self.platform()?.reboot_host(host);
        Ok(())
    }

    /// Fault injection gated on `--wrench-link-shutdown-simulation`
    /// (spec.md §6).
    pub fn crash_link(&self, name: &str) -> WrenchResult<()> {
        if !self.config.link_shutdown_simulation {
            return Err(FailureCause::FunctionalityNotAvailable {
                detail: "link-shutdown fault injection requires --wrench-link-shutdown-simulation".into(),
            }
            .into());
        }
        self.platform()?.crash_link(name);
        Ok(())
    }

    pub fn reboot_link(&self, name: &str) -> WrenchResult<()> {
        self.platform()?.reboot_link(name);
        Ok(())
    }

    /// Run the reactor to completion. Fatal (spec.md §7) to call before
    /// `instantiate_platform` — a simulation with no hardware has
    /// nothing to schedule anything onto.
    pub async fn launch(&self) -> WrenchResult<()> {
        if !self.is_platform_instantiated() {
            return Err(FailureCause::invalid_argument(
                "cannot run a simulation before its platform has been instantiated",
            )
            .into());
        }
        Reactor::new(self.clock.clone(), self.registry.clone()).run_to_completion().await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "simulation_tests.rs"]
mod tests;
