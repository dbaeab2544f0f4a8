//! spec.md §8 scenario 4: `sleep(10) -> {file_read(missing), compute(100)}`.
//! At `t=10` the file read fails with `FileNotFound`; the compute action
//! starts. The compute service is shut down at `t=11`, while the compute
//! action is still running — the job ends DISCONTINUED with
//! `SomeActionsHaveFailed`, the compute action KILLED, the file read
//! FAILED, and the downstream action never becomes READY.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex as PLMutex;
use wrench_core::{
    Action, ActionKind, ActionState, CompoundJob, CompoundJobState, FailureCause, FileId, FileLocation, PropertyMap,
};
use wrench_kernel::{CommPort, SimClock};
use wrench_services::storage_directory::StorageDirectory;
use wrench_services::{StorageService, TransferMode};

use super::prelude::*;

#[tokio::test]
async fn partial_failure_discontinues_the_job_with_some_actions_having_failed() {
    let platform = two_host_platform();
    let clock = SimClock::new();
    let storage_dir = Arc::new(StorageDirectory::new());

    let storage = Arc::new(StorageService::new(
        Arc::clone(&platform.platform),
        clock.clone(),
        platform.host_b,
        "/data",
        TransferMode::NonBufferized,
        PropertyMap::empty(),
    ));
    storage_dir.register_service(Arc::clone(&storage));

    // The file is registered with the directory (so its size is known to
    // resolve a location) but never actually created on the storage
    // service, so the read fails with `FileNotFound`.
    let missing_file = FileId::new();
    storage_dir.register_file(missing_file, 1_000);

    let service = make_compute_service(
        Arc::clone(&platform.platform),
        clock.clone(),
        vec![(platform.host_b, 10, 10_000_000)],
        PropertyMap::empty(),
        Arc::clone(&storage_dir),
    );
    service.start();

    let mut job = CompoundJob::new();
    let sleep_id = job.add_action(Action::new(ActionKind::Sleep { duration_secs: 10.0 }, 1, 1, 0, 0));
    let location = FileLocation::concrete(storage.id(), "/data", "/", missing_file);
    let read_id = job.add_action(Action::new(ActionKind::FileRead { location }, 1, 1, 0, 0));
    let compute_id = job.add_action(Action::new(ActionKind::Compute { flops: 100.0 }, 1, 1, 0, 0));
    let downstream_id = job.add_action(Action::new(ActionKind::Sleep { duration_secs: 1.0 }, 1, 1, 0, 0));
    job.add_dependency(sleep_id, read_id).unwrap();
    job.add_dependency(sleep_id, compute_id).unwrap();
    job.add_dependency(read_id, downstream_id).unwrap();
    job.add_dependency(compute_id, downstream_id).unwrap();
    let job = Arc::new(PLMutex::new(job));

    let answer = Arc::new(CommPort::named("answer", clock.clone()));
    service.submit_job(Arc::clone(&job), HashMap::new(), Arc::clone(&answer)).unwrap();

    // A background watcher that shuts the compute service down once
    // simulated time reaches t=11 — after the file read has failed and
    // the compute action has started, but long before `compute(100)`
    // would finish on its own (host B runs at 10 GF/s/core, so it would
    // otherwise complete at t=20).
    let shutdown_clock = clock.clone();
    let shutdown_service = Arc::clone(&service);
    tokio::spawn(async move {
        shutdown_clock.sleep_for(11.0).await;
        shutdown_service.stop();
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
    assert_eq!(outcome.failure_cause, Some(FailureCause::SomeActionsHaveFailed));
    assert_eq!(clock.now(), 11.0);

    let job = job.lock();
    assert_eq!(job.action(sleep_id).unwrap().state, ActionState::Completed);
    assert_eq!(job.action(read_id).unwrap().state, ActionState::Failed);
    assert_eq!(job.action(read_id).unwrap().failure_cause, Some(FailureCause::FileNotFound { file: missing_file }));
    assert_eq!(job.action(compute_id).unwrap().state, ActionState::Killed);
    assert_eq!(job.action(downstream_id).unwrap().state, ActionState::NotReady);
}
