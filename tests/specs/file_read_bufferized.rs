//! spec.md §8 scenario 2: a 1 MB file staged on `B`'s bufferized storage
//! service (`BUFFER_SIZE = 1 MB`), read by an action running on `A`'s
//! compute service. Completion time is the single-chunk pipeline: disk
//! read time plus link transfer time.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex as PLMutex;
use wrench_core::{Action, ActionKind, ActionState, CompoundJob, CompoundJobState, FileId, FileLocation, PropertyMap};
use wrench_kernel::{CommPort, PlatformBuilder, SimClock};
use wrench_services::storage_directory::StorageDirectory;
use wrench_services::{StorageService, TransferMode};

use super::prelude::*;

const FILE_SIZE: u64 = 1_000_000;
const DISK_BW_BPS: f64 = 500_000.0;

#[tokio::test]
async fn bufferized_file_read_across_the_link_completes_at_the_pipeline_time() {
    // Built directly rather than via `two_host_platform` since this
    // scenario needs a disk on host B that the shared fixture doesn't
    // carve out.
    let (builder, host_a) = PlatformBuilder::new().add_host("A", 1, 1_000_000, 1.0);
    let (builder, host_b) = builder.add_host("B", 10, 10_000_000, 10.0);
    let builder = builder
        .add_link(LINK_NAME, LINK_BANDWIDTH_BPS, 0.0)
        .add_route(host_a, host_b, LINK_NAME)
        .add_disk(host_b, "/data", 10_000_000, DISK_BW_BPS, DISK_BW_BPS);
    let platform = Arc::new(builder.build().unwrap());

    let clock = SimClock::new();
    let storage_dir = Arc::new(StorageDirectory::new());

    let mut props = HashMap::new();
    props.insert("buffer_size".to_string(), FILE_SIZE.to_string());
    let properties = PropertyMap::new(props, &wrench_core::PropertySchema::new(&[(
        "buffer_size",
        wrench_core::PropertyKind::PositiveInt,
    )]))
    .unwrap();
    let storage = Arc::new(StorageService::new(
        Arc::clone(&platform),
        clock.clone(),
        host_b,
        "/data",
        TransferMode::Bufferized,
        properties,
    ));
    storage_dir.register_service(Arc::clone(&storage));

    let file = FileId::new();
    storage_dir.register_file(file, FILE_SIZE);
    storage.create_file(Path::new("/"), file, FILE_SIZE).unwrap();

    let compute = make_compute_service(
        Arc::clone(&platform),
        clock.clone(),
        vec![(host_a, 1, 1_000_000)],
        PropertyMap::empty(),
        Arc::clone(&storage_dir),
    );
    compute.start();

    let location = FileLocation::concrete(storage.id(), "/data", "/", file);
    let mut job = CompoundJob::new();
    let action_id = job.add_action(Action::new(ActionKind::FileRead { location }, 1, 1, 0, 0));
    let job = Arc::new(PLMutex::new(job));
    let answer = Arc::new(CommPort::named("answer", clock.clone()));
    compute.submit_job(Arc::clone(&job), HashMap::new(), Arc::clone(&answer)).unwrap();

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

    assert_eq!(outcome.state, CompoundJobState::Completed);
    let expected = FILE_SIZE as f64 / DISK_BW_BPS + FILE_SIZE as f64 / LINK_BANDWIDTH_BPS;
    assert!((clock.now() - expected).abs() < 1e-6, "got {}, expected {}", clock.now(), expected);

    let job = job.lock();
    assert_eq!(job.action(action_id).unwrap().state, ActionState::Completed);
}
