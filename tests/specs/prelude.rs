//! Shared fixtures for the end-to-end scenarios in spec.md §8.
//!
//! Every scenario in this suite runs on the same two-host platform:
//! host `A` (1 core, 1 GF/s), host `B` (10 cores, 10 GF/s), linked at
//! 100 MB/s with zero latency.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use parking_lot::Mutex as PLMutex;
use wrench_core::{HostId, PropertyMap};
use wrench_kernel::{Platform, PlatformBuilder, SimClock};
use wrench_services::action_executor::CustomActionRegistry;
use wrench_services::storage_directory::StorageDirectory;
use wrench_services::BareMetalComputeService;

pub const LINK_NAME: &str = "net";
pub const LINK_BANDWIDTH_BPS: f64 = 100_000_000.0;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber once per test binary, filtered by
/// `RUST_LOG` (default `info`), so the service/kernel tracing calls have
/// somewhere to go when a scenario is run with `--nocapture`. Scenario
/// code never calls this itself — logging should work whether or not a
/// test is exercising it.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

pub struct TwoHostPlatform {
    pub platform: Arc<Platform>,
    pub host_a: HostId,
    pub host_b: HostId,
}

/// Host `A` (1 core, 1 GF/s), host `B` (10 cores, 10 GF/s), linked at
/// 100 MB/s with zero latency (spec.md §8's scenario preamble).
pub fn two_host_platform() -> TwoHostPlatform {
    let (builder, host_a) = PlatformBuilder::new().add_host("A", 1, 1_000_000, 1.0);
    let (builder, host_b) = builder.add_host("B", 10, 10_000_000, 10.0);
    let builder = builder
        .add_link(LINK_NAME, LINK_BANDWIDTH_BPS, 0.0)
        .add_route(host_a, host_b, LINK_NAME);
    TwoHostPlatform { platform: Arc::new(builder.build().unwrap()), host_a, host_b }
}

pub fn no_custom_actions() -> Arc<CustomActionRegistry> {
    Arc::new(CustomActionRegistry::new())
}

#[allow(clippy::too_many_arguments)]
pub fn make_compute_service(
    platform: Arc<Platform>,
    clock: SimClock,
    resources: Vec<(HostId, u32, u64)>,
    properties: PropertyMap,
    storage: Arc<StorageDirectory>,
) -> Arc<BareMetalComputeService> {
    init_tracing();
    BareMetalComputeService::new(platform, clock, resources, properties, storage, None, no_custom_actions())
        .expect("compute service construction should succeed for a valid resource list")
}

/// Drive the simulated clock forward one pending wakeup at a time until
/// `still_running` reports done, or a generous attempt budget is spent —
/// the bound exists so a stuck scenario fails fast instead of hanging the
/// suite.
pub async fn drive_clock_while(clock: &SimClock, mut still_running: impl FnMut() -> bool) {
    for _ in 0..100_000 {
        if !still_running() {
            return;
        }
        if clock.has_pending_wakeup() {
            clock.advance();
        }
        tokio::task::yield_now().await;
    }
    panic!("scenario did not settle within the attempt budget");
}

pub type SharedJob = Arc<PLMutex<wrench_core::CompoundJob>>;
