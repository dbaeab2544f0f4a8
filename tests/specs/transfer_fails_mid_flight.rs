//! spec.md §4.3's failure semantics for a transfer in flight: a
//! `file_read` action on host `A` pulling from a non-bufferized storage
//! service on host `B`, across the link between them. If `B` crashes
//! while the read is running, the action fails with `HostError`; if the
//! link itself goes down mid-`file_copy`, the copy fails with
//! `NetworkError` and the destination reservation it made is rolled back
//! rather than left orphaned.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex as PLMutex;
use wrench_core::{
    Action, ActionKind, ActionState, CompoundJob, CompoundJobState, FailureCause, FileId, FileLocation, PropertyMap,
};
use wrench_kernel::{CommPort, PlatformBuilder, SimClock};
use wrench_services::storage_directory::StorageDirectory;
use wrench_services::{StorageService, TransferMode};

use super::prelude::*;

const FILE_SIZE: u64 = 1_000_000;
const DISK_BW_BPS: f64 = 1_000.0;

#[tokio::test]
async fn file_read_fails_with_host_error_when_the_storage_host_crashes_mid_transfer() {
    let (builder, host_a) = PlatformBuilder::new().add_host("A", 1, 1_000_000, 1.0);
    let (builder, host_b) = builder.add_host("B", 10, 10_000_000, 10.0);
    let builder = builder
        .add_link(LINK_NAME, LINK_BANDWIDTH_BPS, 0.0)
        .add_route(host_a, host_b, LINK_NAME)
        .add_disk(host_b, "/data", 10_000_000, DISK_BW_BPS, DISK_BW_BPS);
    let platform = Arc::new(builder.build().unwrap());
    let clock = SimClock::new();
    let storage_dir = Arc::new(StorageDirectory::new());

    let storage = Arc::new(StorageService::new(
        Arc::clone(&platform),
        clock.clone(),
        host_b,
        "/data",
        TransferMode::NonBufferized,
        PropertyMap::empty(),
    ));
    storage_dir.register_service(Arc::clone(&storage));

    let file = FileId::new();
    storage_dir.register_file(file, FILE_SIZE);
    storage.create_file(Path::new("/"), file, FILE_SIZE).unwrap();

    let service = make_compute_service(
        Arc::clone(&platform),
        clock.clone(),
        vec![(host_a, 1, 1_000_000)],
        PropertyMap::empty(),
        Arc::clone(&storage_dir),
    );
    service.start();

    let location = FileLocation::concrete(storage.id(), "/data", "/", file);
    let mut job = CompoundJob::new();
    let action_id = job.add_action(Action::new(ActionKind::FileRead { location }, 1, 1, 0, 0));
    let job = Arc::new(PLMutex::new(job));
    let answer = Arc::new(CommPort::named("answer", clock.clone()));
    service.submit_job(Arc::clone(&job), HashMap::new(), Arc::clone(&answer)).unwrap();

    // The read takes FILE_SIZE/DISK_BW_BPS + FILE_SIZE/LINK_BANDWIDTH_BPS
    // seconds; crash the disk's host well before either completes.
    let crash_clock = clock.clone();
    let crash_platform = Arc::clone(&platform);
    tokio::spawn(async move {
        crash_clock.sleep_for(1.0).await;
        crash_platform.crash_host(host_b);
    });

    let got = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let recv = tokio::spawn({
        let answer = Arc::clone(&answer);
        let got = Arc::clone(&got);
        async move {
            let outcome = answer.get().await.unwrap();
            got.store(true, std::sync::atomic::Ordering::SeqCst);
            outcome
        }
    });
    tokio::task::yield_now().await;
    drive_clock_while(&clock, || !got.load(std::sync::atomic::Ordering::SeqCst)).await;
    let outcome = recv.await.unwrap();

    assert_eq!(outcome.state, CompoundJobState::Discontinued);

    let job = job.lock();
    let action = job.action(action_id).unwrap();
    assert_eq!(action.state, ActionState::Failed);
    assert_eq!(action.failure_cause, Some(FailureCause::HostError { host: host_b.to_string() }));
}

#[tokio::test]
async fn file_copy_rolls_back_the_destination_reservation_when_the_link_crashes_mid_transfer() {
    let (builder, host_a) = PlatformBuilder::new().add_host("A", 1, 1_000_000, 1.0);
    let (builder, host_b) = builder.add_host("B", 10, 10_000_000, 10.0);
    let builder = builder
        .add_link(LINK_NAME, LINK_BANDWIDTH_BPS, 0.0)
        .add_route(host_a, host_b, LINK_NAME)
        .add_disk(host_a, "/scratch", 10_000_000, DISK_BW_BPS, DISK_BW_BPS)
        .add_disk(host_b, "/data", 10_000_000, DISK_BW_BPS, DISK_BW_BPS);
    let platform = Arc::new(builder.build().unwrap());
    let clock = SimClock::new();
    let storage_dir = Arc::new(StorageDirectory::new());

    let src = Arc::new(StorageService::new(
        Arc::clone(&platform),
        clock.clone(),
        host_a,
        "/scratch",
        TransferMode::NonBufferized,
        PropertyMap::empty(),
    ));
    let dst = Arc::new(StorageService::new(
        Arc::clone(&platform),
        clock.clone(),
        host_b,
        "/data",
        TransferMode::NonBufferized,
        PropertyMap::empty(),
    ));
    storage_dir.register_service(Arc::clone(&src));
    storage_dir.register_service(Arc::clone(&dst));

    let file = FileId::new();
    storage_dir.register_file(file, FILE_SIZE);
    src.create_file(Path::new("/"), file, FILE_SIZE).unwrap();

    let service = make_compute_service(
        Arc::clone(&platform),
        clock.clone(),
        vec![(host_a, 1, 1_000_000)],
        PropertyMap::empty(),
        Arc::clone(&storage_dir),
    );
    service.start();

    let from = FileLocation::concrete(src.id(), "/scratch", "/", file);
    let to = FileLocation::concrete(dst.id(), "/data", "/", file);
    let mut job = CompoundJob::new();
    let action_id = job.add_action(Action::new(ActionKind::FileCopy { src: from, dst: to }, 1, 1, 0, 0));
    let job = Arc::new(PLMutex::new(job));
    let answer = Arc::new(CommPort::named("answer", clock.clone()));
    service.submit_job(Arc::clone(&job), HashMap::new(), Arc::clone(&answer)).unwrap();

    let crash_clock = clock.clone();
    let crash_platform = Arc::clone(&platform);
    tokio::spawn(async move {
        crash_clock.sleep_for(1.0).await;
        crash_platform.crash_link(LINK_NAME);
    });

    let got = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let recv = tokio::spawn({
        let answer = Arc::clone(&answer);
        let got = Arc::clone(&got);
        async move {
            let outcome = answer.get().await.unwrap();
            got.store(true, std::sync::atomic::Ordering::SeqCst);
            outcome
        }
    });
    tokio::task::yield_now().await;
    drive_clock_while(&clock, || !got.load(std::sync::atomic::Ordering::SeqCst)).await;
    let outcome = recv.await.unwrap();

    assert_eq!(outcome.state, CompoundJobState::Discontinued);

    let job = job.lock();
    let action = job.action(action_id).unwrap();
    assert_eq!(action.state, ActionState::Failed);
    assert!(matches!(action.failure_cause, Some(FailureCause::NetworkError { timeout: false, .. })));
    assert!(!dst.lookup_file(Path::new("/"), file), "destination reservation should be rolled back after the failed copy");
}
