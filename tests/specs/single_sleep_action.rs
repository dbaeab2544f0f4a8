//! spec.md §8 scenario 1: a lone `Sleep(10.0)` action on a compute
//! service covering host `B` completes at `t=10`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as PLMutex;
use wrench_core::{Action, ActionKind, ActionState, CompoundJob, CompoundJobState, PropertyMap};
use wrench_kernel::{CommPort, SimClock, TraceEventKind};
use wrench_services::storage_directory::StorageDirectory;

use super::prelude::*;

#[tokio::test]
async fn single_sleep_action_completes_at_its_duration() {
    let platform = two_host_platform();
    let clock = SimClock::new();
    let service = make_compute_service(
        Arc::clone(&platform.platform),
        clock.clone(),
        vec![(platform.host_b, 10, 10_000_000)],
        PropertyMap::empty(),
        Arc::new(StorageDirectory::new()),
    );
    service.start();

    let mut job = CompoundJob::new();
    let action_id = job.add_action(Action::new(ActionKind::Sleep { duration_secs: 10.0 }, 1, 1, 0, 0));
    let job = Arc::new(PLMutex::new(job));
    let answer = Arc::new(CommPort::named("answer", clock.clone()));
    service.submit_job(Arc::clone(&job), HashMap::new(), Arc::clone(&answer)).unwrap();

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
    assert!(outcome.failure_cause.is_none());
    assert_eq!(clock.now(), 10.0);

    let job = job.lock();
    let action = job.action(action_id).unwrap();
    assert_eq!(action.state, ActionState::Completed);
    assert_eq!(action.start_date, Some(0.0));
    assert_eq!(action.end_date, Some(10.0));
    drop(job);

    // The action's attempt left a paired TaskStart/TaskCompletion episode
    // in the platform's shared trace.
    let trace = platform.platform.trace();
    assert!(!trace.is_empty());
    let entries = trace.entries();
    let start = entries.iter().find(|e| e.kind == TraceEventKind::TaskStart).expect("a TaskStart entry");
    let end = entries.iter().find(|e| e.kind == TraceEventKind::TaskCompletion).expect("a TaskCompletion entry");
    assert_eq!(start.counterpart, Some(end.id));
    assert_eq!(start.timestamp, 0.0);
    assert_eq!(end.timestamp, 10.0);
    assert_eq!(start.host, Some(platform.host_b));
}
