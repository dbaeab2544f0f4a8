// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`StorageService`]: exposes one [`Disk`](wrench_kernel::Disk) mount
//! point's filesystem as a simulated actor, serving read/write/delete
//! requests and modeling bufferized vs. non-bufferized data transfer
//! (spec.md §4.3).

use futures::future::{select_all, BoxFuture, FutureExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use wrench_core::{FailureCause, FileId, HostId, PropertyMap, WrenchResult};
use wrench_kernel::{Link, Platform, SimClock, TraceEventKind};

use crate::service::ServiceHandle;
use crate::transfer::{atomic_transfer_secs, pipelined_transfer_secs};

/// Default chunk size for a bufferized storage service that doesn't
/// override `buffer_size` (4 MB).
pub const DEFAULT_BUFFER_SIZE: u64 = 4_000_000;

/// How a transfer is billed to the network/disk.
///
/// - `Bufferized`: data streams through a fixed-size in-memory buffer, so
///   the transfer's duration is bound by the slower of (source bandwidth,
///   destination bandwidth) rather than by whichever endpoint is slowest
///   end-to-end, and at most `MAX_NUM_CONCURRENT_DATA_CONNECTIONS`
///   transfers share the service's bandwidth concurrently.
/// - `NonBufferized`: the whole payload is transferred as a single
///   unsegmented block; duration is `bytes / bandwidth` with no
///   concurrency limit applied by this service (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Bufferized,
    NonBufferized,
}

/// Default concurrent data-connection cap for a bufferized storage
/// service, matching spec.md §4.3's named constant.
pub const MAX_NUM_CONCURRENT_DATA_CONNECTIONS: usize = 8;

pub struct StorageService {
    handle: ServiceHandle,
    platform: Arc<Platform>,
    clock: SimClock,
    mount_point: PathBuf,
    transfer_mode: TransferMode,
    buffer_size: u64,
    properties: PropertyMap,
    connections: Arc<Semaphore>,
}

impl StorageService {
    pub fn new(
        platform: Arc<Platform>,
        clock: SimClock,
        host: wrench_core::HostId,
        mount_point: impl Into<PathBuf>,
        transfer_mode: TransferMode,
        properties: PropertyMap,
    ) -> Self {
        let max_connections =
            properties.get_u64("max_concurrent_data_connections", MAX_NUM_CONCURRENT_DATA_CONNECTIONS as u64)
                as usize;
        let buffer_size = match transfer_mode {
            TransferMode::Bufferized => properties.get_u64("buffer_size", DEFAULT_BUFFER_SIZE).max(1),
            TransferMode::NonBufferized => 0,
        };
        Self {
            handle: ServiceHandle::new(host),
            platform,
            clock,
            mount_point: mount_point.into(),
            transfer_mode,
            buffer_size,
            properties,
            connections: Arc::new(Semaphore::new(max_connections.max(1))),
        }
    }

    pub fn id(&self) -> wrench_core::ServiceId {
        self.handle.id()
    }

    pub fn host(&self) -> wrench_core::HostId {
        self.handle.host()
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn handle(&self) -> &ServiceHandle {
        &self.handle
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode
    }

    /// `0` for a non-bufferized service (spec.md §4.3: `BUFFER_SIZE = 0`
    /// is exactly what selects non-bufferized mode).
    pub fn buffer_size(&self) -> u64 {
        self.buffer_size
    }

    pub fn read_bandwidth_bps(&self) -> f64 {
        self.platform
            .with_disk(self.handle.host(), &self.mount_point, |disk| disk.read_bw_bps)
            .unwrap_or(f64::INFINITY)
    }

    pub fn write_bandwidth_bps(&self) -> f64 {
        self.platform
            .with_disk(self.handle.host(), &self.mount_point, |disk| disk.write_bw_bps)
            .unwrap_or(f64::INFINITY)
    }

    pub fn lookup_file(&self, directory: &Path, file: FileId) -> bool {
        self.platform
            .with_disk(self.handle.host(), &self.mount_point, |disk| disk.filesystem.lookup_file(directory, file))
            .unwrap_or(false)
    }

    /// True iff `file` is present anywhere on this service's mount (INV-5),
    /// regardless of which directory it landed in.
    pub fn contains_file(&self, file: FileId) -> bool {
        self.platform
            .with_disk(self.handle.host(), &self.mount_point, |disk| disk.filesystem.contains(file))
            .unwrap_or(false)
    }

    /// Reserve `size` bytes for `file` under `directory` without billing
    /// any disk-write time — spec.md §4.3's `createFile`, as distinct from
    /// `writeFile`, which also simulates the write itself.
    pub fn create_file(&self, directory: &Path, file: FileId, size: u64) -> WrenchResult<()> {
        self.handle.require_up()?;
        self.platform
            .with_disk(self.handle.host(), &self.mount_point, |disk| disk.filesystem.create_file(directory, file, size))
            .ok_or_else(|| FailureCause::invalid_argument("no such mount point"))??;
        Ok(())
    }

    /// Write `bytes` of `file` into `directory`, billing the time it takes
    /// against the disk's write bandwidth and (for bufferized transfers)
    /// a shared concurrency permit. Equivalent to [`Self::write_file_over`]
    /// with no network leg (the writer is co-located with this service).
    pub async fn write_file(&self, directory: &Path, file: FileId, bytes: u64) -> WrenchResult<()> {
        self.write_file_over(directory, file, bytes, None).await
    }

    /// Write `bytes` of `file` into `directory`, as billed by an
    /// `ActionExecutor` whose compute service sits on a different host
    /// than this storage service — `link` is the network leg between the
    /// two, billed together with the disk write the same way
    /// [`copy_file`] bills a cross-host copy (spec.md §4.3). Rolls the
    /// reservation back if this service's host or `link` goes down before
    /// the write completes.
    pub async fn write_file_over(
        &self,
        directory: &Path,
        file: FileId,
        bytes: u64,
        link: Option<Link>,
    ) -> WrenchResult<()> {
        self.handle.require_up()?;
        let _permit = self.acquire_connection().await;

        self.platform
            .with_disk(self.handle.host(), &self.mount_point, |disk| disk.filesystem.create_file(directory, file, bytes))
            .ok_or_else(|| FailureCause::invalid_argument("no such mount point"))??;

        let duration = self.transfer_duration(self.write_bandwidth_bps(), bytes, &link);
        let hosts = [self.handle.host()];
        let now = self.clock.now();
        let trace = self.platform.trace();
        let trace_start = trace.start(TraceEventKind::FileWriteStart, now, None, Some(file), Some(self.handle.host()));
        if let Err(cause) = race_transfer(&self.clock, &self.platform, &hosts, &link, duration).await {
            let _ = self.delete_file(file);
            trace.end(trace_start, TraceEventKind::FileWriteFailure, self.clock.now());
            return Err(cause.into());
        }
        trace.end(trace_start, TraceEventKind::FileWriteCompletion, self.clock.now());
        Ok(())
    }

    /// Read `bytes` of `file` from `directory`. Fails with `FileNotFound`
    /// if the file isn't actually reserved there. Equivalent to
    /// [`Self::read_file_over`] with no network leg.
    pub async fn read_file(&self, directory: &Path, file: FileId, bytes: u64) -> WrenchResult<()> {
        self.read_file_over(directory, file, bytes, None).await
    }

    /// Read `bytes` of `file` from `directory`, as billed by an
    /// `ActionExecutor` running on a different host than this storage
    /// service — `link` is the network leg between the executor's host
    /// and this service's host, billed alongside the disk read the same
    /// way [`copy_file`] bills a cross-host copy (spec.md §4.3, §8
    /// scenario 2).
    pub async fn read_file_over(
        &self,
        directory: &Path,
        file: FileId,
        bytes: u64,
        link: Option<Link>,
    ) -> WrenchResult<()> {
        self.handle.require_up()?;
        let _permit = self.acquire_connection().await;

        if !self.lookup_file(directory, file) {
            return Err(FailureCause::FileNotFound { file }.into());
        }
        let duration = self.transfer_duration(self.read_bandwidth_bps(), bytes, &link);
        let hosts = [self.handle.host()];
        let now = self.clock.now();
        let trace = self.platform.trace();
        let trace_start = trace.start(TraceEventKind::FileReadStart, now, None, Some(file), Some(self.handle.host()));
        if let Err(cause) = race_transfer(&self.clock, &self.platform, &hosts, &link, duration).await {
            trace.end(trace_start, TraceEventKind::FileReadFailure, self.clock.now());
            return Err(cause.into());
        }
        trace.end(trace_start, TraceEventKind::FileReadCompletion, self.clock.now());
        Ok(())
    }

    /// Combine this service's own disk bandwidth with an optional network
    /// leg, billed atomically or as a buffer pipeline per this service's
    /// own `transfer_mode` (spec.md §4.3) — the same stage-rate model
    /// [`copy_file`] uses between two storage services, collapsed to one
    /// disk stage plus at most one network stage.
    fn transfer_duration(&self, disk_bw_bps: f64, bytes: u64, link: &Option<Link>) -> f64 {
        let mut stage_rates = vec![disk_bw_bps];
        if let Some(link) = link {
            stage_rates.push(link.bandwidth_bps);
        }
        match self.transfer_mode {
            TransferMode::NonBufferized => {
                let mut total = atomic_transfer_secs(&stage_rates, bytes);
                if let Some(link) = link {
                    total = total.max(link.latency_secs);
                }
                total
            }
            TransferMode::Bufferized => {
                let mut total = pipelined_transfer_secs(&stage_rates, bytes, self.buffer_size);
                if let Some(link) = link {
                    total += link.latency_secs;
                }
                total
            }
        }
    }

    /// Delete a file's reservation. Per spec.md §4.3, a no-op (not a
    /// failure) if the file is absent — the `bool` distinguishes "really
    /// deleted" from "already absent" for cleanup-action logging.
    pub fn delete_file(&self, file: FileId) -> WrenchResult<bool> {
        self.handle.require_up()?;
        Ok(self
            .platform
            .with_disk(self.handle.host(), &self.mount_point, |disk| disk.filesystem.delete_file(file))
            .unwrap_or(false))
    }

    async fn acquire_connection(&self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        match self.transfer_mode {
            // The semaphore is never closed while the service is alive, so
            // `acquire_owned` only returns `Err` in practice if `stop()`
            // raced it; treat that the same as "no limit applies".
            TransferMode::Bufferized => Arc::clone(&self.connections).acquire_owned().await.ok(),
            TransferMode::NonBufferized => None,
        }
    }
}

/// Resolve to a `FailureCause::HostError` the moment `host`'s liveness
/// watch flips down, or never resolve if `host` isn't tracked by `platform`
/// at all (same-host transfers where the endpoint was never registered as
/// a host, which callers treat as "never goes down").
fn host_down_signal(platform: &Platform, host: HostId) -> Option<BoxFuture<'static, FailureCause>> {
    let rx = platform.watch_host(host)?;
    Some(wait_until_down(rx).map(move |()| FailureCause::host_error(host.to_string())).boxed())
}

/// Same as [`host_down_signal`] for a named link.
fn link_down_signal(platform: &Platform, link: &Link) -> Option<BoxFuture<'static, FailureCause>> {
    let rx = platform.watch_link(&link.name)?;
    let name = link.name.clone();
    Some(
        wait_until_down(rx)
            .map(move |()| FailureCause::network_error(format!("link '{name}' went down mid-transfer")))
            .boxed(),
    )
}

async fn wait_until_down(mut rx: watch::Receiver<bool>) {
    loop {
        if !*rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped — the platform that owns it outlives every
            // transfer racing against it, so this is unreachable in
            // practice; treat it as "never observed to go down".
            std::future::pending::<()>().await;
        }
    }
}

/// Race `duration` of simulated transfer time against `hosts` and (if
/// present) `link` going down mid-transfer — the same kill-switch-vs-body
/// race `action_executor::spawn` runs for an action whose host crashes
/// while it's executing (spec.md §4.3's failure semantics: "if the host
/// carrying a running transfer is turned off, the transfer fails with
/// HostError; if a link along the route goes down, with NetworkError").
async fn race_transfer(
    clock: &SimClock,
    platform: &Platform,
    hosts: &[HostId],
    link: &Option<Link>,
    duration: f64,
) -> Result<(), FailureCause> {
    let mut down_signals: Vec<BoxFuture<'static, FailureCause>> =
        hosts.iter().filter_map(|host| host_down_signal(platform, *host)).collect();
    if let Some(link) = link {
        down_signals.extend(link_down_signal(platform, link));
    }

    if down_signals.is_empty() {
        clock.sleep_for(duration).await;
        return Ok(());
    }

    tokio::select! {
        biased;
        (cause, ..) = select_all(down_signals) => Err(cause),
        () = clock.sleep_for(duration) => Ok(()),
    }
}

/// Copy `file` (`size` bytes) from `src_dir` on `src` to `dst_dir` on
/// `dst`, reserving space on `dst` first and rolling the reservation back
/// on any failure. `link` is the network leg between the two services'
/// hosts, or `None` for a same-host self-copy (spec.md §4.3 "self-copy
/// across mounts of the same host is supported").
///
/// Cross-mode negotiation: if either endpoint is non-bufferized, the
/// whole copy is billed non-bufferized (spec.md §4.3).
pub async fn copy_file(
    src: &Arc<StorageService>,
    src_dir: &Path,
    dst: &Arc<StorageService>,
    dst_dir: &Path,
    file: FileId,
    size: u64,
    link: Option<Link>,
) -> WrenchResult<()> {
    src.handle.require_up()?;
    dst.handle.require_up()?;
    if !src.lookup_file(src_dir, file) {
        return Err(FailureCause::FileNotFound { file }.into());
    }

    let src_permit = src.acquire_connection().await;
    let dst_permit = dst.acquire_connection().await;

    dst.create_file(dst_dir, file, size)?;

    let mut stage_rates = vec![src.read_bandwidth_bps()];
    if let Some(link) = &link {
        stage_rates.push(link.bandwidth_bps);
    }
    stage_rates.push(dst.write_bandwidth_bps());

    let non_bufferized =
        src.transfer_mode == TransferMode::NonBufferized || dst.transfer_mode == TransferMode::NonBufferized;
    let duration = if non_bufferized {
        let mut total = atomic_transfer_secs(&stage_rates, size);
        if let Some(link) = &link {
            total = total.max(link.latency_secs);
        }
        total
    } else {
        let buffer = src.buffer_size.min(dst.buffer_size).max(1);
        let mut total = pipelined_transfer_secs(&stage_rates, size, buffer);
        if let Some(link) = &link {
            total += link.latency_secs;
        }
        total
    };

    let hosts = [src.handle.host(), dst.handle.host()];
    let now = src.clock.now();
    let trace = src.platform.trace();
    let trace_start = trace.start(TraceEventKind::FileCopyStart, now, None, Some(file), Some(src.handle.host()));
    let result = race_transfer(&src.clock, &src.platform, &hosts, &link, duration).await;
    drop(src_permit);
    drop(dst_permit);

    if let Err(cause) = result {
        trace.end(trace_start, TraceEventKind::FileCopyFailure, src.clock.now());
        let _ = dst.delete_file(file);
        return Err(cause.into());
    }
    trace.end(trace_start, TraceEventKind::FileCopyCompletion, src.clock.now());
    Ok(())
}

#[cfg(test)]
#[path = "storage_service_tests.rs"]
mod tests;
