// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulated hardware: hosts, links, and disks. Built programmatically via
//! [`PlatformBuilder`] rather than parsed from an XML platform file — the
//! simulator embeds its topology description directly (Design Notes §9,
//! "no XML platform parser").

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use wrench_core::{FailureCause, HostId, LogicalFileSystem};

use crate::trace::SimulationTrace;

/// A simulated compute host. `up` flips to `false` under a host-crash
/// fault injection and back under a reboot; every action executing on a
/// crashed host fails with `FailureCause::HostError`.
#[derive(Debug)]
pub struct Host {
    pub id: HostId,
    pub num_cores: u32,
    pub ram_capacity: u64,
    pub flop_rate: f64,
    pub up: bool,
}

/// A simulated network link. Transfer duration for `bytes` across a link
/// is `latency_secs + bytes as f64 / bandwidth_bps`.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    pub bandwidth_bps: f64,
    pub latency_secs: f64,
}

impl Link {
    pub fn transfer_time(&self, bytes: u64) -> f64 {
        self.latency_secs + (bytes as f64) / self.bandwidth_bps
    }
}

/// A mounted disk on a host: its raw capabilities plus the logical
/// filesystem tracking what's reserved on it.
pub struct Disk {
    pub host: HostId,
    pub mount_point: PathBuf,
    pub read_bw_bps: f64,
    pub write_bw_bps: f64,
    pub filesystem: LogicalFileSystem,
}

impl Disk {
    pub fn read_time(&self, bytes: u64) -> f64 {
        bytes as f64 / self.read_bw_bps
    }

    pub fn write_time(&self, bytes: u64) -> f64 {
        bytes as f64 / self.write_bw_bps
    }
}

/// The simulated hardware topology: hosts, named links, and the disks
/// mounted on hosts. Interior mutability on each entry so services sharing
/// an `Arc<Platform>` can mutate host liveness or disk reservations
/// without the whole platform being behind one lock.
pub struct Platform {
    hosts: HashMap<HostId, Mutex<Host>>,
    /// One liveness channel per host, `true` while up. Lets a service with
    /// no other reason to poll (a storage transfer in flight, say) await a
    /// crash instead of finding out only when it next touches the host.
    host_liveness: HashMap<HostId, watch::Sender<bool>>,
    links: HashMap<String, Link>,
    link_liveness: HashMap<String, watch::Sender<bool>>,
    disks: RwLock<HashMap<(HostId, PathBuf), Mutex<Disk>>>,
    /// (host, host) -> link name; routes are entered symmetrically by
    /// `PlatformBuilder::add_route`. No entry for a pair means "no route
    /// configured", which callers treat as "same-host, no network leg".
    routes: HashMap<(HostId, HostId), String>,
    /// The simulation-output trace (spec.md §6). Hosted here rather than
    /// threaded separately through every service constructor, since
    /// `Arc<Platform>` is already the one handle every service, executor,
    /// and transfer already carries.
    trace: SimulationTrace,
}

impl Platform {
    pub fn is_host_up(&self, host: HostId) -> bool {
        self.hosts.get(&host).map(|h| h.lock().up).unwrap_or(false)
    }

    pub fn host_cores(&self, host: HostId) -> Option<u32> {
        self.hosts.get(&host).map(|h| h.lock().num_cores)
    }

    pub fn host_ram(&self, host: HostId) -> Option<u64> {
        self.hosts.get(&host).map(|h| h.lock().ram_capacity)
    }

    pub fn host_flop_rate(&self, host: HostId) -> Option<f64> {
        self.hosts.get(&host).map(|h| h.lock().flop_rate)
    }

    /// Fault injection: bring a host down. Every action currently running
    /// there should be failed with `FailureCause::HostError` by its
    /// executor; a storage transfer in flight learns the same way, by
    /// awaiting [`Self::watch_host`].
    pub fn crash_host(&self, host: HostId) {
        if let Some(h) = self.hosts.get(&host) {
            h.lock().up = false;
        }
        if let Some(tx) = self.host_liveness.get(&host) {
            let _ = tx.send(false);
        }
    }

    pub fn reboot_host(&self, host: HostId) {
        if let Some(h) = self.hosts.get(&host) {
            h.lock().up = true;
        }
        if let Some(tx) = self.host_liveness.get(&host) {
            let _ = tx.send(true);
        }
    }

    /// Subscribe to `host`'s liveness. `None` if `host` isn't on this
    /// platform at all (a caller racing a transfer against this should
    /// treat that the same as "never goes down").
    pub fn watch_host(&self, host: HostId) -> Option<watch::Receiver<bool>> {
        self.host_liveness.get(&host).map(|tx| tx.subscribe())
    }

    pub fn link(&self, name: &str) -> Option<Link> {
        self.links.get(name).cloned()
    }

    pub fn is_link_up(&self, name: &str) -> bool {
        self.link_liveness.get(name).map(|tx| *tx.borrow()).unwrap_or(true)
    }

    /// Fault injection: bring a named link down. Any transfer routed over
    /// it fails with `NetworkError` (spec.md §4.3's failure semantics).
    pub fn crash_link(&self, name: &str) {
        if let Some(tx) = self.link_liveness.get(name) {
            let _ = tx.send(false);
        }
    }

    pub fn reboot_link(&self, name: &str) {
        if let Some(tx) = self.link_liveness.get(name) {
            let _ = tx.send(true);
        }
    }

    /// Subscribe to the named link's liveness. `None` if no such link is
    /// configured on this platform.
    pub fn watch_link(&self, name: &str) -> Option<watch::Receiver<bool>> {
        self.link_liveness.get(name).map(|tx| tx.subscribe())
    }

    /// Resolve the network leg between two hosts, if any. Same-host pairs
    /// and pairs with no configured route both return `None`, which
    /// callers treat as "no network time to bill".
    pub fn route(&self, a: HostId, b: HostId) -> Option<Link> {
        if a == b {
            return None;
        }
        let name = self.routes.get(&(a, b))?;
        self.links.get(name).cloned()
    }

    pub fn with_disk<R>(&self, host: HostId, mount: &Path, f: impl FnOnce(&mut Disk) -> R) -> Option<R> {
        let disks = self.disks.read();
        disks.get(&(host, mount.to_path_buf())).map(|d| f(&mut d.lock()))
    }

    /// The simulation-output trace shared by every service and executor
    /// holding this platform.
    pub fn trace(&self) -> &SimulationTrace {
        &self.trace
    }

    /// Add a disk to an already-built platform. Takes `&self` (behind an
    /// internal `RwLock`) rather than `&mut self` because pilot-job child
    /// compute services and scratch-space allocation happen after the
    /// platform is already shared via `Arc` across running services.
    pub fn create_new_disk(
        &self,
        host: HostId,
        mount_point: impl Into<PathBuf>,
        capacity: u64,
        read_bw_bps: f64,
        write_bw_bps: f64,
    ) -> Result<(), FailureCause> {
        // spec.md §6: late disk additions require symmetric bandwidth.
        if read_bw_bps != write_bw_bps {
            return Err(FailureCause::invalid_argument(
                "createNewDisk requires read_bw == write_bw",
            ));
        }
        let mount_point = mount_point.into();
        let key = (host, mount_point.clone());
        let mut disks = self.disks.write();
        if disks.contains_key(&key) {
            return Err(FailureCause::invalid_argument(format!(
                "a disk is already mounted at {} on host {}",
                mount_point.display(),
                host
            )));
        }
        disks.insert(
            key,
            Mutex::new(Disk {
                host,
                mount_point,
                read_bw_bps,
                write_bw_bps,
                filesystem: LogicalFileSystem::new(capacity),
            }),
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct PlatformBuilder {
    hosts: Vec<Host>,
    links: Vec<Link>,
    disks: Vec<(HostId, PathBuf, u64, f64, f64)>,
    routes: HashMap<(HostId, HostId), String>,
}

impl PlatformBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_host(
        mut self,
        id: impl Into<String>,
        num_cores: u32,
        ram_capacity: u64,
        flop_rate: f64,
    ) -> (Self, HostId) {
        let host_id = HostId::from_string(id.into());
        self.hosts.push(Host { id: host_id, num_cores, ram_capacity, flop_rate, up: true });
        (self, host_id)
    }

    pub fn add_link(mut self, name: impl Into<String>, bandwidth_bps: f64, latency_secs: f64) -> Self {
        self.links.push(Link { name: name.into(), bandwidth_bps, latency_secs });
        self
    }

    pub fn add_disk(
        mut self,
        host: HostId,
        mount_point: impl Into<PathBuf>,
        capacity: u64,
        read_bw_bps: f64,
        write_bw_bps: f64,
    ) -> Self {
        self.disks.push((host, mount_point.into(), capacity, read_bw_bps, write_bw_bps));
        self
    }

    /// Record a symmetric route between two hosts over a named link
    /// (spec.md §6's platform-description "routes").
    pub fn add_route(mut self, a: HostId, b: HostId, link_name: impl Into<String>) -> Self {
        let name = link_name.into();
        self.routes.insert((a, b), name.clone());
        self.routes.insert((b, a), name);
        self
    }

    /// Build the platform. Rejects a duplicate `(host, mount_point)` pair
    /// among the disks added before construction, the same way
    /// `Platform::create_new_disk` rejects one added afterward (spec.md §3's
    /// LogicalFileSystem invariant — "enforced at init").
    pub fn build(self) -> Result<Platform, FailureCause> {
        let mut seen = HashSet::with_capacity(self.disks.len());
        for (host, mount_point, ..) in &self.disks {
            if !seen.insert((*host, mount_point.clone())) {
                return Err(FailureCause::invalid_argument(format!(
                    "a disk is already mounted at {} on host {}",
                    mount_point.display(),
                    host
                )));
            }
        }

        let host_liveness = self.hosts.iter().map(|h| (h.id, watch::channel(true).0)).collect();
        let link_liveness = self.links.iter().map(|l| (l.name.clone(), watch::channel(true).0)).collect();
        let hosts = self.hosts.into_iter().map(|h| (h.id, Mutex::new(h))).collect();
        let links = self.links.into_iter().map(|l| (l.name.clone(), l)).collect();
        let disks = RwLock::new(
            self.disks
                .into_iter()
                .map(|(host, mount_point, capacity, read_bw_bps, write_bw_bps)| {
                    let key = (host, mount_point.clone());
                    let disk = Mutex::new(Disk {
                        host,
                        mount_point,
                        read_bw_bps,
                        write_bw_bps,
                        filesystem: LogicalFileSystem::new(capacity),
                    });
                    (key, disk)
                })
                .collect(),
        );
        Ok(Platform {
            hosts,
            host_liveness,
            links,
            link_liveness,
            disks,
            routes: self.routes,
            trace: SimulationTrace::new(),
        })
    }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
